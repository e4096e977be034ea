//! Machine-readable run report
//!
//! What `run --output json` prints and what `schema` describes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::expectation::{ExpectationRecord, Verdict};
use crate::stats::RunSummary;

/// Full result of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Every classified test in execution order
    pub records: Vec<ExpectationRecord>,
    /// End-of-run hints (credentials, reachability)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn new(summary: RunSummary, records: Vec<ExpectationRecord>) -> Self {
        Self {
            suggestions: summary.suggestions(),
            summary,
            records,
        }
    }

    /// Records that did not pass.
    pub fn problems(&self) -> impl Iterator<Item = &ExpectationRecord> {
        self.records.iter().filter(|r| r.verdict != Verdict::Pass)
    }
}

/// Generate JSON Schema for the run report.
///
/// # Errors
///
/// Returns error if the schema cannot be serialized
pub fn generate_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(RunReport);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::HttpMethod;
    use crate::expectation::{ExecutionErrorKind, ResponseCodeFamily};

    fn record(id: u64, verdict: Verdict) -> ExpectationRecord {
        ExpectationRecord {
            test_id: id,
            path: "/pets".into(),
            method: HttpMethod::Post,
            fuzzer: "EmptyBodyFuzzer".into(),
            scenario: "Send a request with an empty string body".into(),
            expected: Some(ResponseCodeFamily::ClientError),
            actual: Some(400),
            verdict,
            detail: String::new(),
        }
    }

    #[test]
    fn deserialize_report() {
        let json = r#"{
            "summary": {
                "total_executed": 2,
                "passed": 1,
                "functional_failures": 1,
                "execution_errors": 0,
                "auth_errors": 0,
                "io_errors": 0
            },
            "records": [{
                "test_id": 1,
                "path": "/pets",
                "method": "POST",
                "fuzzer": "EmptyBodyFuzzer",
                "scenario": "empty body",
                "expected": "4XX",
                "actual": 200,
                "verdict": "functional_failure",
                "detail": "expected 4XX, got 200"
            }]
        }"#;
        let report: RunReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.summary.exit_code(), 1);
        assert_eq!(report.records[0].verdict, Verdict::FunctionalFailure);
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn problems_skip_passes() {
        let report = RunReport::new(
            RunSummary::default(),
            vec![
                record(1, Verdict::Pass),
                record(2, Verdict::ExecutionError(ExecutionErrorKind::Fuzzer)),
            ],
        );
        let ids: Vec<u64> = report.problems().map(|r| r.test_id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn schema_generation_produces_valid_json() {
        let schema = generate_schema().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(
            parsed.get("title").and_then(|v| v.as_str()),
            Some("RunReport")
        );
    }
}
