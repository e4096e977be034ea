//! Execution reporter: receives lifecycle events as they happen

use contractfuzz_core::{ExpectationRecord, HttpMethod, Verdict};

/// Sink for scheduler lifecycle events
///
/// Called from the scheduler's single thread, in execution order.
pub trait Reporter {
    /// A path is about to run `scheduled` tests.
    fn path_started(&mut self, path: &str, scheduled: u64);
    fn before_fuzz(&mut self, fuzzer: &str, method: HttpMethod, path: &str);
    fn after_fuzz(&mut self, fuzzer: &str, method: HttpMethod, path: &str);
    fn test_started(&mut self, test_id: u64, fuzzer: &str, scenario: &str);
    fn test_finished(&mut self, record: &ExpectationRecord);
}

/// Logs every event and keeps the records for the final report
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// Print one line per non-passing test on stderr
    echo_problems: bool,
    records: Vec<ExpectationRecord>,
}

impl ConsoleReporter {
    #[must_use]
    pub fn new(echo_problems: bool) -> Self {
        Self {
            echo_problems,
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[ExpectationRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<ExpectationRecord> {
        self.records
    }
}

impl Reporter for ConsoleReporter {
    fn path_started(&mut self, path: &str, scheduled: u64) {
        tracing::info!("Fuzzing {path}: {scheduled} tests scheduled");
        if self.echo_problems {
            eprintln!("{path}: {scheduled} tests");
        }
    }

    fn before_fuzz(&mut self, fuzzer: &str, method: HttpMethod, path: &str) {
        tracing::debug!("{fuzzer} -> {method} {path}");
    }

    fn after_fuzz(&mut self, fuzzer: &str, method: HttpMethod, path: &str) {
        tracing::debug!("{fuzzer} done with {method} {path}");
    }

    fn test_started(&mut self, test_id: u64, fuzzer: &str, scenario: &str) {
        tracing::trace!("Test {test_id} [{fuzzer}] {scenario}");
    }

    fn test_finished(&mut self, record: &ExpectationRecord) {
        match record.verdict {
            Verdict::Pass => tracing::debug!("Test {} passed: {}", record.test_id, record.detail),
            Verdict::FunctionalFailure => {
                tracing::warn!("Test {} failed: {}", record.test_id, record.detail);
            }
            Verdict::ExecutionError(kind) => {
                tracing::warn!("Test {} errored ({kind:?}): {}", record.test_id, record.detail);
            }
        }
        if self.echo_problems && record.verdict != Verdict::Pass {
            eprintln!(
                "  #{} {} {} [{}] {}",
                record.test_id, record.method, record.path, record.fuzzer, record.detail
            );
        }
        self.records.push(record.clone());
    }
}
