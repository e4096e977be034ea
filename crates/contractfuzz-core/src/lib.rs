//! contractfuzz-core: data model and decision logic for contract fuzzing
//!
//! Holds everything that does not touch the network: configuration and
//! per-path override resolution, the contract model, fuzz cases and mutation
//! candidates, the probe catalog, expectation/verdict logic and run statistics.

pub mod case;
pub mod config;
pub mod contract;
pub mod dryrun;
pub mod expectation;
pub mod overrides;
pub mod probes;
pub mod schema;
pub mod stats;

pub use case::{
    AssembledRequest, BoundaryPoint, FuzzCase, MutationCandidate, MutationKind, MutationTarget,
    RequestBody, TrimOutcome,
};
pub use config::{Config, ConfigLoadError, EdgeSpacesStrategy, FilterConfig};
pub use contract::{
    Constraints, Contract, ContractOperation, ContractPath, FieldKind, FieldLocation, FieldSpec,
    HttpMethod,
};
pub use dryrun::{PathPlan, SchedulePlan, SkippedOperation};
pub use expectation::{
    ExecutionErrorKind, ExpectationEngine, ExpectationRecord, ExpectationRule, Observation,
    ResponseCodeFamily, Validity, Verdict,
};
pub use overrides::{OverrideSet, PathConfig, PathOverrides};
pub use probes::ProbeCategory;
pub use schema::RunReport;
pub use stats::{RunStatistics, RunSummary};
