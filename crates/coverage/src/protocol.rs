//! Profiler / CSS domain payloads
//!
//! Only the fields coverage needs. Everything else in the browser's
//! response is ignored on deserialization.

use serde::Deserialize;
use serde_json::Value;

use crate::range::CoverageRange;
use crate::registry::SourceId;

/// One function's block ranges from `Profiler.takePreciseCoverage`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCoverage {
    #[serde(default)]
    pub function_name: String,
    pub ranges: Vec<CoverageRange>,
    #[serde(default)]
    pub is_block_coverage: bool,
}

/// One script's entry from `Profiler.takePreciseCoverage`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCoverage {
    pub script_id: SourceId,
    #[serde(default)]
    pub url: String,
    pub functions: Vec<FunctionCoverage>,
}

impl ScriptCoverage {
    /// All function ranges of the script, in reported order
    pub fn ranges(&self) -> Vec<CoverageRange> {
        self.functions
            .iter()
            .flat_map(|function| function.ranges.iter().copied())
            .collect()
    }
}

/// Result of `Profiler.takePreciseCoverage`, kept raw so the per-script
/// objects can be handed back verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct TakePreciseCoverageResult {
    #[serde(default)]
    pub result: Vec<Value>,
}

/// One rule's entry from `CSS.stopRuleUsageTracking`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUsage {
    pub style_sheet_id: SourceId,
    pub start_offset: usize,
    pub end_offset: usize,
    pub used: bool,
}

impl RuleUsage {
    /// Usage as a reducer input: a used rule counts once, an unused one zero times
    pub fn as_range(&self) -> CoverageRange {
        CoverageRange::new(self.start_offset, self.end_offset, u64::from(self.used))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRuleUsageTrackingResult {
    pub rule_usage: Vec<RuleUsage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceResult {
    pub script_source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetStyleSheetTextResult {
    pub text: String,
}
