//! Expectation engine: expected response-code family and verdict classification
//!
//! A functional failure (wrong family) and an execution error (transport,
//! timeout, auth rejection, fuzzer fault) are distinct verdicts and are never
//! folded into one another.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::contract::HttpMethod;

/// Leading-digit class of an HTTP status code
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum ResponseCodeFamily {
    #[serde(rename = "1XX", alias = "1xx")]
    Informational,
    #[serde(rename = "2XX", alias = "2xx")]
    Success,
    #[serde(rename = "3XX", alias = "3xx")]
    Redirection,
    #[serde(rename = "4XX", alias = "4xx")]
    ClientError,
    #[serde(rename = "5XX", alias = "5xx")]
    ServerError,
}

impl ResponseCodeFamily {
    #[must_use]
    pub const fn leading_digit(self) -> u16 {
        match self {
            Self::Informational => 1,
            Self::Success => 2,
            Self::Redirection => 3,
            Self::ClientError => 4,
            Self::ServerError => 5,
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code / 100 {
            1 => Some(Self::Informational),
            2 => Some(Self::Success),
            3 => Some(Self::Redirection),
            4 => Some(Self::ClientError),
            5 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// Family of a declared response key: "201", "2XX", "2xx". `default` has none.
    #[must_use]
    pub fn from_response_key(key: &str) -> Option<Self> {
        let first = key.chars().next()?.to_digit(10)?;
        let rest = &key[1..];
        let valid_rest = rest.len() == 2
            && (rest.chars().all(|c| c.is_ascii_digit()) || rest.eq_ignore_ascii_case("xx"));
        if !valid_rest {
            return None;
        }
        Self::from_code(u16::try_from(first).ok()? * 100)
    }

    #[must_use]
    pub const fn matches(self, code: u16) -> bool {
        code / 100 == self.leading_digit()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "1XX",
            Self::Success => "2XX",
            Self::Redirection => "3XX",
            Self::ClientError => "4XX",
            Self::ServerError => "5XX",
        }
    }
}

impl std::fmt::Display for ResponseCodeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a mutated value is still acceptable under the field's contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    Invalid,
}

/// How a fuzzer derives its expected family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationRule {
    /// Valid mutation → 2XX, invalid → 4XX
    ByValidity,
    /// Family depends only on whether the target is required
    ByRequiredness {
        required: ResponseCodeFamily,
        optional: ResponseCodeFamily,
    },
    Fixed(ResponseCodeFamily),
}

/// Category of an execution error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    /// 401/403 from the service
    Auth,
    /// Transport failure or timeout
    Io,
    /// The fuzzer itself failed for this case
    Fuzzer,
}

/// Outcome of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    FunctionalFailure,
    ExecutionError(ExecutionErrorKind),
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::FunctionalFailure => f.write_str("FAIL"),
            Self::ExecutionError(kind) => write!(f, "ERROR ({kind:?})"),
        }
    }
}

/// What happened on the wire, as reported by the service invoker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Response { status: u16 },
    Timeout { message: String },
    Transport { message: String },
}

/// One classified test, streamed to the reporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExpectationRecord {
    /// Sequential test number within the run
    pub test_id: u64,
    pub path: String,
    pub method: HttpMethod,
    pub fuzzer: String,
    pub scenario: String,
    /// Absent when the fuzzer failed before a request could be sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<ResponseCodeFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<u16>,
    pub verdict: Verdict,
    pub detail: String,
}

/// Maps scenarios to expected families and classifies observations
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectationEngine;

impl ExpectationEngine {
    /// Expected family for a mutation of a field with the given requiredness.
    #[must_use]
    pub const fn expect(
        &self,
        rule: ExpectationRule,
        required: bool,
        validity: Validity,
    ) -> ResponseCodeFamily {
        match rule {
            ExpectationRule::Fixed(family) => family,
            ExpectationRule::ByRequiredness {
                required: r,
                optional: o,
            } => {
                if required {
                    r
                } else {
                    o
                }
            }
            ExpectationRule::ByValidity => match validity {
                Validity::Valid => ResponseCodeFamily::Success,
                Validity::Invalid => ResponseCodeFamily::ClientError,
            },
        }
    }

    /// Classify an observation against the expected family.
    ///
    /// Returns the verdict and a one-line explanation.
    #[must_use]
    pub fn classify(
        &self,
        expected: ResponseCodeFamily,
        observation: &Observation,
    ) -> (Verdict, String) {
        match observation {
            Observation::Timeout { message } => (
                Verdict::ExecutionError(ExecutionErrorKind::Io),
                format!("request timed out: {message}"),
            ),
            Observation::Transport { message } => (
                Verdict::ExecutionError(ExecutionErrorKind::Io),
                format!("transport error: {message}"),
            ),
            Observation::Response { status } if matches!(status, 401 | 403) => (
                Verdict::ExecutionError(ExecutionErrorKind::Auth),
                format!("authentication rejected with {status}"),
            ),
            Observation::Response { status } if expected.matches(*status) => (
                Verdict::Pass,
                format!("expected {expected}, got {status}"),
            ),
            Observation::Response { status } => (
                Verdict::FunctionalFailure,
                format!("expected {expected}, got {status}"),
            ),
        }
    }
}
