//! Dry run plan types and config validation
//!
//! Describes what a run *would* execute without sending any requests.
//! Used for pre-flight validation and CI previews.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Config;
use crate::contract::HttpMethod;

// ── Plan types ──

/// Complete schedule for a run: per-path totals, skipped operations, config checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchedulePlan {
    /// Selected paths in execution order
    pub paths: Vec<PathPlan>,
    /// Operations the catalog or the assembler left out
    pub skipped: Vec<SkippedOperation>,
    /// Tests that would be executed across all paths
    pub total_tests: u64,
    /// Config/contract validation results
    pub validations: Vec<Validation>,
}

/// Schedule for a single contract path.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PathPlan {
    pub path: String,
    /// Methods with at least one assembled case
    pub methods: Vec<HttpMethod>,
    /// Assembled fuzz cases across all methods
    pub cases: u64,
    /// Phase-1 fuzzers left after method skip filters
    pub phase_one: Vec<String>,
    pub phase_two: Vec<String>,
    /// eligible phase-1 fuzzers × cases + phase-2 fuzzers
    pub scheduled: u64,
}

/// An operation that will not be fuzzed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedOperation {
    pub path: String,
    pub method: HttpMethod,
    pub reason: String,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ── Config validation ──

/// Pre-flight checks on the contract, server URL and override files.
#[must_use]
pub fn validate_config(config: &Config) -> Vec<Validation> {
    let mut checks = Vec::new();

    if config.contract.exists() {
        checks.push(Validation {
            check: "contract".into(),
            status: ValidationStatus::Ok,
            message: format!("contract: {} (exists)", config.contract.display()),
        });
    } else {
        checks.push(Validation {
            check: "contract".into(),
            status: ValidationStatus::Error,
            message: format!("contract: {} (not found)", config.contract.display()),
        });
    }

    if config.server.starts_with("http://") || config.server.starts_with("https://") {
        checks.push(Validation {
            check: "server".into(),
            status: ValidationStatus::Ok,
            message: format!("server: {}", config.server),
        });
    } else {
        checks.push(Validation {
            check: "server".into(),
            status: ValidationStatus::Warning,
            message: format!("server: {} (missing http:// or https:// prefix)", config.server),
        });
    }

    // Override files must at least exist; content errors surface when loading
    let files = [
        ("headers_file", &config.headers_file),
        ("query_params_file", &config.query_params_file),
        ("ref_data_file", &config.ref_data_file),
    ];
    for (check, file) in files {
        if let Some(path) = file {
            let (status, note) = if path.exists() {
                (ValidationStatus::Ok, "exists")
            } else {
                (ValidationStatus::Error, "not found")
            };
            checks.push(Validation {
                check: check.into(),
                status,
                message: format!("{check}: {} ({note})", path.display()),
            });
        }
    }

    checks
}

// ── Display helpers ──

impl SchedulePlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Dry run: {} paths, {} tests planned\n",
            self.paths.len(),
            self.total_tests,
        ));

        for p in &self.paths {
            let methods: Vec<&str> = p.methods.iter().map(|m| m.as_str()).collect();
            lines.push(format!("{} ({} tests):", p.path, p.scheduled));
            lines.push(format!("  Methods: {}", methods.join(", ")));
            lines.push(format!("  Cases: {}", p.cases));
            if !p.phase_one.is_empty() {
                lines.push(format!("  Phase 1: {}", p.phase_one.join(", ")));
            }
            if !p.phase_two.is_empty() {
                lines.push(format!("  Phase 2: {}", p.phase_two.join(", ")));
            }
            lines.push(String::new());
        }

        if !self.skipped.is_empty() {
            lines.push("Skipped:".into());
            for s in &self.skipped {
                lines.push(format!("  {} {}: {}", s.method, s.path, s.reason));
            }
            lines.push(String::new());
        }

        lines.push("Config validation:".into());
        for v in &self.validations {
            lines.push(format!("  [{}] {}", v.status, v.message));
        }

        lines.join("\n")
    }

    /// Returns true if any validation has Error status.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn base_config() -> Config {
        Config {
            contract: PathBuf::from("nonexistent.yaml"),
            ..Config::default()
        }
    }

    #[test]
    fn validate_reports_contract_and_server_only() {
        let cfg = Config {
            headers: BTreeMap::from([(
                "Authorization".to_string(),
                "Bearer <your-token-here>".to_string(),
            )]),
            ..base_config()
        };
        let checks = validate_config(&cfg);
        let names: Vec<&str> = checks.iter().map(|c| c.check.as_str()).collect();
        assert_eq!(names, vec!["contract", "server"]);
        assert_eq!(checks[0].status, ValidationStatus::Error);
    }

    #[test]
    fn validate_bad_server_url() {
        let cfg = Config {
            server: "localhost:8080".into(),
            ..base_config()
        };
        let checks = validate_config(&cfg);
        let url_check = checks.iter().find(|c| c.check == "server").unwrap();
        assert_eq!(url_check.status, ValidationStatus::Warning);
    }

    #[test]
    fn validate_missing_override_file() {
        let cfg = Config {
            ref_data_file: Some(PathBuf::from("missing-refdata.yml")),
            ..base_config()
        };
        let checks = validate_config(&cfg);
        let check = checks.iter().find(|c| c.check == "ref_data_file").unwrap();
        assert_eq!(check.status, ValidationStatus::Error);
        assert!(checks.iter().all(|c| c.check != "headers_file"));
    }

    #[test]
    fn plan_terminal_output() {
        let plan = SchedulePlan {
            paths: vec![PathPlan {
                path: "/pets".into(),
                methods: vec![HttpMethod::Post, HttpMethod::Delete],
                cases: 2,
                phase_one: vec!["OnlySpacesInHeadersFuzzer".into()],
                phase_two: vec!["CheckDeletedResourcesNotAvailableFuzzer".into()],
                scheduled: 3,
            }],
            skipped: vec![SkippedOperation {
                path: "/health".into(),
                method: HttpMethod::Get,
                reason: "path not selected".into(),
            }],
            total_tests: 3,
            validations: vec![Validation {
                check: "contract".into(),
                status: ValidationStatus::Ok,
                message: "contract: openapi.yaml (exists)".into(),
            }],
        };

        let text = plan.to_terminal();
        assert!(text.contains("1 paths, 3 tests planned"));
        assert!(text.contains("/pets (3 tests)"));
        assert!(text.contains("Methods: POST, DELETE"));
        assert!(text.contains("Phase 2: CheckDeletedResourcesNotAvailableFuzzer"));
        assert!(text.contains("GET /health: path not selected"));
        assert!(text.contains("[OK] contract: openapi.yaml (exists)"));
        assert!(!plan.has_errors());
    }
}
