//! contractfuzz-runner: execution engine for contract fuzzing
//!
//! Turns a contract into an ordered operation catalog, assembles fuzz cases,
//! and runs the registered fuzzers against a live service in two phases.

pub mod assembler;
pub mod catalog;
pub mod datagen;
pub mod fuzzers;
pub mod invoker;
pub mod openapi;
pub mod reporter;
pub mod scheduler;
pub mod strategy;
pub mod update;
pub mod validation;

pub use assembler::{CaseAssembler, DefaultAssembler, OperationAssemblyError};
pub use catalog::{CatalogFilter, CatalogPath, OperationCatalog};
pub use fuzzers::{
    DeletedResourcesFuzzer, DescriptorFuzzer, Fuzzer, FuzzerDescriptor, FuzzerExecutionError,
    FuzzerInfo, FuzzerRegistry, PathFuzzer,
};
pub use invoker::{HttpInvoker, ServiceInvoker, TransportError};
pub use openapi::{ContractParseError, load_contract, parse_contract};
pub use reporter::{ConsoleReporter, Reporter};
pub use scheduler::{Execution, PathHistory, Scheduler, TestSpec, plan};
pub use strategy::MutationStrategy;
pub use update::VersionCheck;
