//! Run-wide statistics
//!
//! Counters only ever increase and are read once at the end of the run.
//! Atomics let one background task record alongside the scheduler.

use std::sync::atomic::{AtomicU64, Ordering};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::expectation::{ExecutionErrorKind, Verdict};

/// Exit status when the run itself could not start (config/contract errors)
pub const EXIT_FATAL: i32 = 3;

/// Thread-safe run counters
#[derive(Debug, Default)]
pub struct RunStatistics {
    total_executed: AtomicU64,
    passed: AtomicU64,
    functional_failures: AtomicU64,
    auth_errors: AtomicU64,
    io_errors: AtomicU64,
    fuzzer_errors: AtomicU64,
}

impl RunStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one classified test.
    pub fn record(&self, verdict: Verdict) {
        self.total_executed.fetch_add(1, Ordering::Relaxed);
        let counter = match verdict {
            Verdict::Pass => &self.passed,
            Verdict::FunctionalFailure => &self.functional_failures,
            Verdict::ExecutionError(ExecutionErrorKind::Auth) => &self.auth_errors,
            Verdict::ExecutionError(ExecutionErrorKind::Io) => &self.io_errors,
            Verdict::ExecutionError(ExecutionErrorKind::Fuzzer) => &self.fuzzer_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Consolidated end-of-run view.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let auth_errors = self.auth_errors.load(Ordering::Relaxed);
        let io_errors = self.io_errors.load(Ordering::Relaxed);
        let fuzzer_errors = self.fuzzer_errors.load(Ordering::Relaxed);
        RunSummary {
            total_executed: self.total_executed.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            functional_failures: self.functional_failures.load(Ordering::Relaxed),
            execution_errors: auth_errors + io_errors + fuzzer_errors,
            auth_errors,
            io_errors,
        }
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    pub total_executed: u64,
    pub passed: u64,
    pub functional_failures: u64,
    /// Auth, io and fuzzer errors together
    pub execution_errors: u64,
    pub auth_errors: u64,
    pub io_errors: u64,
}

impl RunSummary {
    /// Process exit status for a completed run.
    ///
    /// - 0: every test passed
    /// - 1: functional failures only
    /// - 2: at least one execution error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.execution_errors > 0 {
            2
        } else if self.functional_failures > 0 {
            1
        } else {
            0
        }
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.exit_code() == 0
    }

    /// Auth rejections make up at least half of the executed tests.
    #[must_use]
    pub const fn mostly_auth_errors(&self) -> bool {
        self.auth_errors > 0 && self.auth_errors * 2 >= self.total_executed
    }

    /// Io errors make up at least half of the executed tests.
    #[must_use]
    pub const fn mostly_io_errors(&self) -> bool {
        self.io_errors > 0 && self.io_errors * 2 >= self.total_executed
    }

    /// Actionable hints derived from the error mix.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.mostly_auth_errors() {
            out.push(format!(
                "There were {} tests failing with authorisation errors. Either supply authentication details or check if the supplied credentials are correct",
                self.auth_errors
            ));
        }
        if self.mostly_io_errors() {
            out.push(format!(
                "There were {} tests failing with i/o errors. Make sure the service is reachable and the server url is correct",
                self.io_errors
            ));
        }
        out
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} executed, {} passed, {} functional failures, {} execution errors ({} auth, {} io)",
            self.total_executed,
            self.passed,
            self.functional_failures,
            self.execution_errors,
            self.auth_errors,
            self.io_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn record_routes_each_verdict() {
        let stats = RunStatistics::new();
        stats.record(Verdict::Pass);
        stats.record(Verdict::FunctionalFailure);
        stats.record(Verdict::ExecutionError(ExecutionErrorKind::Auth));
        stats.record(Verdict::ExecutionError(ExecutionErrorKind::Io));
        stats.record(Verdict::ExecutionError(ExecutionErrorKind::Fuzzer));

        let s = stats.summary();
        assert_eq!(s.total_executed, 5);
        assert_eq!(s.passed, 1);
        assert_eq!(s.functional_failures, 1);
        assert_eq!(s.auth_errors, 1);
        assert_eq!(s.io_errors, 1);
        assert_eq!(s.execution_errors, 3);
    }

    #[test]
    fn exit_code_tiers() {
        let clean = RunSummary {
            total_executed: 3,
            passed: 3,
            ..Default::default()
        };
        assert_eq!(clean.exit_code(), 0);
        assert!(clean.is_clean());

        let failing = RunSummary {
            functional_failures: 1,
            ..clean
        };
        assert_eq!(failing.exit_code(), 1);

        let erroring = RunSummary {
            execution_errors: 1,
            io_errors: 1,
            ..failing
        };
        assert_eq!(erroring.exit_code(), 2);
        assert_ne!(erroring.exit_code(), EXIT_FATAL);
    }

    #[test]
    fn suggestions_follow_error_mix() {
        let s = RunSummary {
            total_executed: 10,
            auth_errors: 6,
            execution_errors: 6,
            ..Default::default()
        };
        let hints = s.suggestions();
        assert_eq!(hints.len(), 1);
        assert!(hints[0].contains("6 tests"));

        let quiet = RunSummary {
            total_executed: 10,
            io_errors: 2,
            execution_errors: 2,
            ..Default::default()
        };
        assert!(quiet.suggestions().is_empty());
    }

    #[test]
    fn concurrent_writer_is_counted() {
        let stats = Arc::new(RunStatistics::new());
        let background = {
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats.record(Verdict::ExecutionError(ExecutionErrorKind::Io));
                }
            })
        };
        for _ in 0..1000 {
            stats.record(Verdict::Pass);
        }
        background.join().unwrap();

        let s = stats.summary();
        assert_eq!(s.total_executed, 2000);
        assert_eq!(s.passed, 1000);
        assert_eq!(s.io_errors, 1000);
    }
}
