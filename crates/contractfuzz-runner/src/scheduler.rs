//! Two-phase scheduler
//!
//! Per catalog path: assemble every case, publish the scheduled total, run
//! each eligible phase-1 fuzzer over every case (fuzzer-major, strictly
//! sequential), then every phase-2 fuzzer once. A failing or panicking
//! fuzzer/case pair is recorded as an execution error and the schedule
//! continues with the next pair.

use std::panic::{AssertUnwindSafe, catch_unwind};

use contractfuzz_core::{
    AssembledRequest, ExecutionErrorKind, ExpectationEngine, ExpectationRecord, FuzzCase,
    HttpMethod, Observation, PathPlan, ResponseCodeFamily, RunStatistics, RunSummary,
    SchedulePlan, SkippedOperation, Verdict,
};

use crate::assembler::CaseAssembler;
use crate::catalog::{CatalogPath, OperationCatalog};
use crate::fuzzers::{FuzzerExecutionError, FuzzerRegistry};
use crate::invoker::{ServiceInvoker, TransportError};
use crate::reporter::Reporter;

/// One test a fuzzer asks the scheduler to run
#[derive(Debug, Clone, PartialEq)]
pub struct TestSpec {
    pub scenario: String,
    pub request: AssembledRequest,
    pub expected: ResponseCodeFamily,
    /// Extra context appended to the verdict detail
    pub note: Option<String>,
}

/// What phase 1 left behind for phase-2 fuzzers of the current path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathHistory {
    /// DELETE requests answered with 2xx, in execution order
    pub deleted: Vec<AssembledRequest>,
}

/// Execution context handed to fuzzers: sends requests, classifies, records
pub struct Execution<'s> {
    invoker: &'s dyn ServiceInvoker,
    reporter: &'s mut dyn Reporter,
    stats: &'s RunStatistics,
    engine: ExpectationEngine,
    next_id: u64,
    path: String,
    fuzzer: String,
    history: PathHistory,
}

impl<'s> Execution<'s> {
    pub fn new(
        invoker: &'s dyn ServiceInvoker,
        reporter: &'s mut dyn Reporter,
        stats: &'s RunStatistics,
    ) -> Self {
        Self {
            invoker,
            reporter,
            stats,
            engine: ExpectationEngine,
            next_id: 0,
            path: String::new(),
            fuzzer: String::new(),
            history: PathHistory::default(),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &ExpectationEngine {
        &self.engine
    }

    #[must_use]
    pub const fn history(&self) -> &PathHistory {
        &self.history
    }

    fn begin_path(&mut self, path: &str) {
        self.path = path.to_string();
        self.history = PathHistory::default();
    }

    fn begin_fuzzer(&mut self, name: &str) {
        self.fuzzer = name.to_string();
    }

    /// Send one test and record its verdict.
    ///
    /// A request the invoker cannot put on the wire is not sent; it is
    /// recorded as an io error.
    pub fn execute(&mut self, test: TestSpec) {
        self.next_id += 1;
        let test_id = self.next_id;
        self.reporter.test_started(test_id, &self.fuzzer, &test.scenario);
        if !self.invoker.accepts(&test.request) {
            tracing::info!(
                "Test {test_id}: {} request not expressible over HTTP, not sent",
                self.fuzzer
            );
            self.finish(ExpectationRecord {
                test_id,
                path: self.path.clone(),
                method: test.request.method,
                fuzzer: self.fuzzer.clone(),
                scenario: test.scenario,
                expected: Some(test.expected),
                actual: None,
                verdict: Verdict::ExecutionError(ExecutionErrorKind::Io),
                detail: "request not expressible over HTTP, not sent".to_string(),
            });
            return;
        }
        tracing::debug!(
            "Test {test_id}: {} {} headers={:?} query={:?} body={:?}",
            test.request.method,
            test.request.path,
            test.request.headers,
            test.request.query,
            test.request.body.as_ref().map(contractfuzz_core::RequestBody::to_text)
        );

        let observation = match self.invoker.invoke(&test.request) {
            Ok(status) => Observation::Response { status },
            Err(TransportError::Timeout(message)) => Observation::Timeout { message },
            Err(e) => Observation::Transport {
                message: e.to_string(),
            },
        };
        let (verdict, detail) = self.engine.classify(test.expected, &observation);
        let actual = match observation {
            Observation::Response { status } => Some(status),
            _ => None,
        };
        if test.request.method == HttpMethod::Delete
            && actual.is_some_and(|s| ResponseCodeFamily::Success.matches(s))
        {
            self.history.deleted.push(test.request.clone());
        }

        self.finish(ExpectationRecord {
            test_id,
            path: self.path.clone(),
            method: test.request.method,
            fuzzer: self.fuzzer.clone(),
            scenario: test.scenario,
            expected: Some(test.expected),
            actual,
            verdict,
            detail: match test.note {
                Some(note) => format!("{detail} ({note})"),
                None => detail,
            },
        });
    }

    /// Record a fuzzer/case pair that failed before producing its tests.
    fn record_failure(&mut self, method: HttpMethod, error: &FuzzerExecutionError) {
        tracing::warn!("{error}; continuing with the next fuzzer");
        self.next_id += 1;
        self.finish(ExpectationRecord {
            test_id: self.next_id,
            path: self.path.clone(),
            method,
            fuzzer: self.fuzzer.clone(),
            scenario: "fuzzer execution".to_string(),
            expected: None,
            actual: None,
            verdict: Verdict::ExecutionError(ExecutionErrorKind::Fuzzer),
            detail: error.to_string(),
        });
    }

    fn finish(&mut self, record: ExpectationRecord) {
        self.stats.record(record.verdict);
        self.reporter.test_finished(&record);
    }
}

/// Runs registered fuzzers over a catalog against one service
pub struct Scheduler<'a> {
    registry: &'a FuzzerRegistry,
    invoker: &'a dyn ServiceInvoker,
    stats: &'a RunStatistics,
}

impl<'a> Scheduler<'a> {
    #[must_use]
    pub const fn new(
        registry: &'a FuzzerRegistry,
        invoker: &'a dyn ServiceInvoker,
        stats: &'a RunStatistics,
    ) -> Self {
        Self {
            registry,
            invoker,
            stats,
        }
    }

    /// Fuzz every path of the catalog in order and return the run summary.
    pub fn run(
        &self,
        catalog: &OperationCatalog,
        assembler: &dyn CaseAssembler,
        reporter: &mut dyn Reporter,
    ) -> RunSummary {
        let mut exec = Execution::new(self.invoker, reporter, self.stats);
        for entry in &catalog.paths {
            self.fuzz_path(entry, assembler, &mut exec);
        }
        self.stats.summary()
    }

    fn fuzz_path(
        &self,
        entry: &CatalogPath,
        assembler: &dyn CaseAssembler,
        exec: &mut Execution<'_>,
    ) {
        tracing::info!("Start fuzzing path {}", entry.path);
        let cases = assemble_path(entry, assembler, |skip| {
            tracing::warn!("Skipping {} {}: {}", skip.method, skip.path, skip.reason);
        });
        if cases.is_empty() {
            tracing::warn!("Skipping path {}: no case could be assembled", entry.path);
            return;
        }

        let methods = batch_methods(&cases);
        let eligible = self.registry.eligible_for(&methods);
        let phase_two = self.registry.phase_two();
        let scheduled = (eligible.len() * cases.len() + phase_two.len()) as u64;
        exec.begin_path(&entry.path);
        exec.reporter.path_started(&entry.path, scheduled);

        for fuzzer in eligible {
            exec.begin_fuzzer(fuzzer.name());
            for case in &cases {
                exec.reporter
                    .before_fuzz(fuzzer.name(), case.method(), case.path());
                let outcome = catch_unwind(AssertUnwindSafe(|| fuzzer.fuzz(case, exec)))
                    .unwrap_or_else(|payload| {
                        Err(FuzzerExecutionError::Panicked {
                            fuzzer: fuzzer.name().to_string(),
                            message: panic_message(payload.as_ref()),
                        })
                    });
                if let Err(e) = outcome {
                    exec.record_failure(case.method(), &e);
                }
                exec.reporter
                    .after_fuzz(fuzzer.name(), case.method(), case.path());
            }
        }

        for fuzzer in phase_two {
            exec.begin_fuzzer(fuzzer.name());
            let method = cases[0].method();
            let outcome = catch_unwind(AssertUnwindSafe(|| fuzzer.fuzz_path(&cases, exec)))
                .unwrap_or_else(|payload| {
                    Err(FuzzerExecutionError::Panicked {
                        fuzzer: fuzzer.name().to_string(),
                        message: panic_message(payload.as_ref()),
                    })
                });
            if let Err(e) = outcome {
                exec.record_failure(method, &e);
            }
        }
    }
}

/// Assemble the cases of every operation under one path, reporting failures.
///
/// A panicking assembler skips only the operation it panicked on.
fn assemble_path(
    entry: &CatalogPath,
    assembler: &dyn CaseAssembler,
    mut on_skip: impl FnMut(&SkippedOperation),
) -> Vec<FuzzCase> {
    let mut cases = Vec::new();
    for op in &entry.operations {
        let reason = match catch_unwind(AssertUnwindSafe(|| assembler.assemble(op))) {
            Ok(Ok(assembled)) if assembled.is_empty() => "no case assembled".to_string(),
            Ok(Ok(assembled)) => {
                cases.extend(assembled);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("assembly panicked: {}", panic_message(payload.as_ref())),
        };
        on_skip(&SkippedOperation {
            path: op.path.clone(),
            method: op.method,
            reason,
        });
    }
    cases
}

fn batch_methods(cases: &[FuzzCase]) -> Vec<HttpMethod> {
    let mut methods: Vec<HttpMethod> = Vec::new();
    for case in cases {
        if !methods.contains(&case.method()) {
            methods.push(case.method());
        }
    }
    methods
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// What `run` would execute, without sending a request.
#[must_use]
pub fn plan(
    registry: &FuzzerRegistry,
    catalog: &OperationCatalog,
    assembler: &dyn CaseAssembler,
) -> SchedulePlan {
    let mut skipped = catalog.skipped.clone();
    let mut paths = Vec::new();
    for entry in &catalog.paths {
        let cases = assemble_path(entry, assembler, |skip| skipped.push(skip.clone()));
        if cases.is_empty() {
            continue;
        }
        let methods = batch_methods(&cases);
        let phase_one: Vec<String> = registry
            .eligible_for(&methods)
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        let phase_two: Vec<String> = registry
            .phase_two()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        let scheduled = (phase_one.len() * cases.len() + phase_two.len()) as u64;
        paths.push(PathPlan {
            path: entry.path.clone(),
            methods,
            cases: cases.len() as u64,
            phase_one,
            phase_two,
            scheduled,
        });
    }
    SchedulePlan {
        total_tests: paths.iter().map(|p| p.scheduled).sum(),
        paths,
        skipped,
        validations: Vec::new(),
    }
}
