//! JavaScript coverage
//!
//! Uses the profiler's precise (block level) coverage. While collecting,
//! every `Debugger.scriptParsed` triggers a background fetch of the script
//! source; on stop the profiler's accumulated counts are joined with those
//! sources and reduced to used spans.

use cdp::{ProtocolSession, EVALUATION_SCRIPT_URL};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::entry::CoverageEntry;
use crate::error::{CoverageError, Result};
use crate::events::{CoverageEvent, EXECUTION_CONTEXTS_CLEARED, SCRIPT_PARSED};
use crate::fetch::{spawn_source_fetch, SourceFetch};
use crate::listeners::Listeners;
use crate::protocol::{GetScriptSourceResult, ScriptCoverage, TakePreciseCoverageResult};
use crate::range::reduce;
use crate::registry::{SharedRegistry, SourceRegistry};

/// Options for [`JsCoverage::start`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsCoverageOptions {
    /// Drop everything collected so far when the page's execution contexts
    /// are torn down (reload, navigation)
    pub reset_on_navigation: bool,
    /// Report scripts without a URL under `debugger://VM<scriptId>`
    pub report_anonymous_scripts: bool,
    /// Attach the profiler's per-script result to each entry
    pub include_raw_script_coverage: bool,
    /// Block-level ranges; function-level only when false
    pub use_block_coverage: bool,
}

impl Default for JsCoverageOptions {
    fn default() -> Self {
        Self {
            reset_on_navigation: true,
            report_anonymous_scripts: false,
            include_raw_script_coverage: false,
            use_block_coverage: true,
        }
    }
}

impl JsCoverageOptions {
    pub fn with_reset_on_navigation(mut self, enabled: bool) -> Self {
        self.reset_on_navigation = enabled;
        self
    }

    pub fn with_report_anonymous_scripts(mut self, enabled: bool) -> Self {
        self.report_anonymous_scripts = enabled;
        self
    }

    pub fn with_raw_script_coverage(mut self, enabled: bool) -> Self {
        self.include_raw_script_coverage = enabled;
        self
    }

    pub fn with_block_coverage(mut self, enabled: bool) -> Self {
        self.use_block_coverage = enabled;
        self
    }
}

/// URL reported for a script that has none
pub fn anonymous_script_url(script_id: &str) -> String {
    format!("debugger://VM{script_id}")
}

/// JavaScript coverage collector. Idle until [`start`](Self::start).
pub struct JsCoverage {
    session: Arc<dyn ProtocolSession>,
    enabled: bool,
    options: JsCoverageOptions,
    registry: SharedRegistry,
    listeners: Listeners,
}

impl JsCoverage {
    pub fn new(session: Arc<dyn ProtocolSession>) -> Self {
        Self {
            session,
            enabled: false,
            options: JsCoverageOptions::default(),
            registry: Arc::new(Mutex::new(SourceRegistry::new())),
            listeners: Listeners::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn start(&mut self, options: JsCoverageOptions) -> Result<()> {
        if self.enabled {
            return Err(CoverageError::InvalidState("JSCoverage is already enabled"));
        }

        self.registry.lock().reset();
        self.options = options;
        self.enabled = true;

        let handler = {
            let session = self.session.clone();
            let registry = self.registry.clone();
            let options = self.options.clone();
            Arc::new(move |event| on_event(&session, &registry, &options, event))
        };
        self.listeners
            .add(self.session.as_ref(), SCRIPT_PARSED, handler.clone());
        self.listeners
            .add(self.session.as_ref(), EXECUTION_CONTEXTS_CLEARED, handler);

        let session = self.session.as_ref();
        let enabled = futures_util::try_join!(
            session.send("Profiler.enable", None),
            session.send(
                "Profiler.startPreciseCoverage",
                Some(json!({
                    "callCount": self.options.include_raw_script_coverage,
                    "detailed": self.options.use_block_coverage,
                })),
            ),
            session.send("Debugger.enable", None),
            session.send("Debugger.setSkipAllPauses", Some(json!({ "skip": true }))),
        );

        if let Err(e) = enabled {
            tracing::warn!("Failed to start JS coverage: {}", e);
            self.listeners.remove_all(session);
            self.enabled = false;
            return Err(e.into());
        }

        tracing::info!("JS coverage started ({:?})", self.options);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<Vec<CoverageEntry>> {
        if !self.enabled {
            return Err(CoverageError::InvalidState("JSCoverage is not enabled"));
        }
        self.enabled = false;

        let session = self.session.as_ref();
        let stopped = futures_util::try_join!(
            session.send("Profiler.takePreciseCoverage", None),
            session.send("Profiler.stopPreciseCoverage", None),
            session.send("Profiler.disable", None),
            session.send("Debugger.disable", None),
        );
        self.listeners.remove_all(session);

        let (taken, ..) = stopped?;
        let taken: TakePreciseCoverageResult = serde_json::from_value(taken)?;
        let entries = self.build_entries(taken.result);

        tracing::info!("JS coverage stopped: {} entries", entries.len());
        Ok(entries)
    }

    fn build_entries(&self, scripts: Vec<Value>) -> Vec<CoverageEntry> {
        let registry = self.registry.lock();
        let mut entries = Vec::with_capacity(scripts.len());

        for raw in scripts {
            let script = match ScriptCoverage::deserialize(&raw) {
                Ok(script) => script,
                Err(e) => {
                    tracing::warn!("Skipping malformed script coverage: {}", e);
                    continue;
                }
            };

            let Some(source) = registry.get(&script.script_id) else {
                tracing::debug!("No source for script {}, skipping", script.script_id);
                continue;
            };
            let url = match &source.url {
                Some(url) => url.clone(),
                None if self.options.report_anonymous_scripts => {
                    anonymous_script_url(&script.script_id)
                }
                None => continue,
            };

            entries.push(CoverageEntry {
                url,
                ranges: reduce(&script.ranges()),
                text: source.text.clone(),
                raw_script_coverage: self.options.include_raw_script_coverage.then_some(raw),
            });
        }

        entries
    }
}

fn on_event(
    session: &Arc<dyn ProtocolSession>,
    registry: &SharedRegistry,
    options: &JsCoverageOptions,
    event: CoverageEvent,
) {
    match event {
        CoverageEvent::ScriptParsed { script_id, url } => {
            if url == EVALUATION_SCRIPT_URL {
                return;
            }
            if url.is_empty() && !options.report_anonymous_scripts {
                return;
            }
            spawn_source_fetch(
                session.clone(),
                registry.clone(),
                SourceFetch {
                    params: json!({ "scriptId": script_id }),
                    id: script_id,
                    url: (!url.is_empty()).then_some(url),
                    method: "Debugger.getScriptSource",
                    extract: |value| {
                        serde_json::from_value::<GetScriptSourceResult>(value)
                            .map(|result| result.script_source)
                    },
                },
            );
        }
        CoverageEvent::ExecutionContextsCleared => {
            if options.reset_on_navigation {
                tracing::debug!("Execution contexts cleared, resetting script registry");
                registry.lock().reset();
            }
        }
        CoverageEvent::StyleSheetAdded { .. } => {}
    }
}
