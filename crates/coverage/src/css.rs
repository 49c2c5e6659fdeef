//! CSS coverage
//!
//! Rule usage tracking reports one record per rule, across every stylesheet
//! in the page. Sheets are learned from `CSS.styleSheetAdded`; only sheets
//! with a source URL are fetched and reported.

use ahash::AHashMap;
use cdp::ProtocolSession;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::entry::CoverageEntry;
use crate::error::{CoverageError, Result};
use crate::events::{CoverageEvent, EXECUTION_CONTEXTS_CLEARED, STYLE_SHEET_ADDED};
use crate::fetch::{spawn_source_fetch, SourceFetch};
use crate::listeners::Listeners;
use crate::protocol::{GetStyleSheetTextResult, RuleUsage, StopRuleUsageTrackingResult};
use crate::range::{reduce, CoverageRange};
use crate::registry::{SharedRegistry, SourceId, SourceRegistry};

/// Options for [`CssCoverage::start`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CssCoverageOptions {
    /// Drop everything collected so far when the page's execution contexts
    /// are torn down (reload, navigation)
    pub reset_on_navigation: bool,
}

impl Default for CssCoverageOptions {
    fn default() -> Self {
        Self {
            reset_on_navigation: true,
        }
    }
}

impl CssCoverageOptions {
    pub fn with_reset_on_navigation(mut self, enabled: bool) -> Self {
        self.reset_on_navigation = enabled;
        self
    }
}

/// CSS coverage collector. Idle until [`start`](Self::start).
pub struct CssCoverage {
    session: Arc<dyn ProtocolSession>,
    enabled: bool,
    options: CssCoverageOptions,
    registry: SharedRegistry,
    listeners: Listeners,
}

impl CssCoverage {
    pub fn new(session: Arc<dyn ProtocolSession>) -> Self {
        Self {
            session,
            enabled: false,
            options: CssCoverageOptions::default(),
            registry: Arc::new(Mutex::new(SourceRegistry::new())),
            listeners: Listeners::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn start(&mut self, options: CssCoverageOptions) -> Result<()> {
        if self.enabled {
            return Err(CoverageError::InvalidState("CSSCoverage is already enabled"));
        }

        self.registry.lock().reset();
        self.options = options;
        self.enabled = true;

        let handler = {
            let session = self.session.clone();
            let registry = self.registry.clone();
            let reset_on_navigation = self.options.reset_on_navigation;
            Arc::new(move |event| on_event(&session, &registry, reset_on_navigation, event))
        };
        self.listeners
            .add(self.session.as_ref(), STYLE_SHEET_ADDED, handler.clone());
        self.listeners
            .add(self.session.as_ref(), EXECUTION_CONTEXTS_CLEARED, handler);

        let session = self.session.as_ref();
        let enabled = futures_util::try_join!(
            session.send("DOM.enable", None),
            session.send("CSS.enable", None),
            session.send("CSS.startRuleUsageTracking", None),
        );

        if let Err(e) = enabled {
            tracing::warn!("Failed to start CSS coverage: {}", e);
            self.listeners.remove_all(session);
            self.enabled = false;
            return Err(e.into());
        }

        tracing::info!("CSS coverage started ({:?})", self.options);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<Vec<CoverageEntry>> {
        if !self.enabled {
            return Err(CoverageError::InvalidState("CSSCoverage is not enabled"));
        }
        self.enabled = false;

        let session = self.session.as_ref();
        let tracked = session.send("CSS.stopRuleUsageTracking", None).await;
        let disabled = futures_util::try_join!(
            session.send("CSS.disable", None),
            session.send("DOM.disable", None),
        );
        self.listeners.remove_all(session);

        let tracked: StopRuleUsageTrackingResult = serde_json::from_value(tracked?)?;
        disabled?;

        let entries = self.build_entries(&tracked.rule_usage);
        tracing::info!("CSS coverage stopped: {} entries", entries.len());
        Ok(entries)
    }

    fn build_entries(&self, usage: &[RuleUsage]) -> Vec<CoverageEntry> {
        let mut by_sheet: AHashMap<&SourceId, Vec<CoverageRange>> = AHashMap::new();
        for rule in usage {
            by_sheet
                .entry(&rule.style_sheet_id)
                .or_default()
                .push(rule.as_range());
        }

        let registry = self.registry.lock();
        registry
            .ids()
            .filter_map(|id| {
                let source = registry.get(id)?;
                let url = source.url.clone()?;
                let ranges = by_sheet.get(id).map(|r| reduce(r)).unwrap_or_default();
                Some(CoverageEntry {
                    url,
                    ranges,
                    text: source.text.clone(),
                    raw_script_coverage: None,
                })
            })
            .collect()
    }
}

fn on_event(
    session: &Arc<dyn ProtocolSession>,
    registry: &SharedRegistry,
    reset_on_navigation: bool,
    event: CoverageEvent,
) {
    match event {
        CoverageEvent::StyleSheetAdded {
            style_sheet_id,
            source_url,
        } => {
            // Inline and constructed sheets have no URL and are never reported
            if source_url.is_empty() {
                return;
            }
            spawn_source_fetch(
                session.clone(),
                registry.clone(),
                SourceFetch {
                    params: json!({ "styleSheetId": style_sheet_id }),
                    id: style_sheet_id,
                    url: Some(source_url),
                    method: "CSS.getStyleSheetText",
                    extract: |value| {
                        serde_json::from_value::<GetStyleSheetTextResult>(value)
                            .map(|result| result.text)
                    },
                },
            );
        }
        CoverageEvent::ExecutionContextsCleared => {
            if reset_on_navigation {
                tracing::debug!("Execution contexts cleared, resetting stylesheet registry");
                registry.lock().reset();
            }
        }
        CoverageEvent::ScriptParsed { .. } => {}
    }
}
