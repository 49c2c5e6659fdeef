//! Coverage events
//!
//! The handful of protocol events the collectors react to, as a closed enum.
//! Raw events are matched by method name exactly once, here.

use cdp::CDPEvent;
use serde::Deserialize;

use crate::registry::SourceId;

pub const SCRIPT_PARSED: &str = "Debugger.scriptParsed";
pub const EXECUTION_CONTEXTS_CLEARED: &str = "Runtime.executionContextsCleared";
pub const STYLE_SHEET_ADDED: &str = "CSS.styleSheetAdded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageEvent {
    ScriptParsed { script_id: SourceId, url: String },
    ExecutionContextsCleared,
    StyleSheetAdded { style_sheet_id: SourceId, source_url: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptParsedParams {
    script_id: SourceId,
    #[serde(default)]
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StyleSheetHeader {
    style_sheet_id: SourceId,
    #[serde(rename = "sourceURL", default)]
    source_url: String,
}

#[derive(Deserialize)]
struct StyleSheetAddedParams {
    header: StyleSheetHeader,
}

impl CoverageEvent {
    /// Parse a raw event. `Ok(None)` for methods coverage does not care about.
    pub fn from_cdp(event: &CDPEvent) -> Result<Option<Self>, serde_json::Error> {
        let params = event.params.clone().unwrap_or_default();
        let parsed = match event.method.as_str() {
            SCRIPT_PARSED => {
                let params: ScriptParsedParams = serde_json::from_value(params)?;
                CoverageEvent::ScriptParsed {
                    script_id: params.script_id,
                    url: params.url,
                }
            }
            EXECUTION_CONTEXTS_CLEARED => CoverageEvent::ExecutionContextsCleared,
            STYLE_SHEET_ADDED => {
                let params: StyleSheetAddedParams = serde_json::from_value(params)?;
                CoverageEvent::StyleSheetAdded {
                    style_sheet_id: params.header.style_sheet_id,
                    source_url: params.header.source_url,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}
