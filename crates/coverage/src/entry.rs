//! Report entry

use serde::Serialize;
use serde_json::Value;

use crate::range::UsedRange;

/// Coverage of one source file: the spans that ran, plus the text they index into
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageEntry {
    pub url: String,
    pub ranges: Vec<UsedRange>,
    pub text: String,
    /// The profiler's per-script result, verbatim. JS only, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_script_coverage: Option<Value>,
}

impl CoverageEntry {
    /// Total length of the used spans
    pub fn used_len(&self) -> usize {
        self.ranges.iter().map(UsedRange::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_omits_missing_raw() {
        let entry = CoverageEntry {
            url: "https://a.test/s.css".to_string(),
            ranges: vec![UsedRange::new(0, 4), UsedRange::new(10, 12)],
            text: "a{} b{} c{}".to_string(),
            raw_script_coverage: None,
        };

        assert_eq!(entry.used_len(), 6);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "url": "https://a.test/s.css",
                "ranges": [{ "start": 0, "end": 4 }, { "start": 10, "end": 12 }],
                "text": "a{} b{} c{}"
            })
        );
    }
}
