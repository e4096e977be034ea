//! Operation catalog: deterministic, filtered view of the contract
//!
//! Paths are ordered lexicographically regardless of how the contract lists
//! them; methods keep their declaration order within a path. Every operation a
//! filter removes is logged and kept in [`OperationCatalog::skipped`].

use std::sync::Arc;

use contractfuzz_core::{
    Contract, ContractOperation, FilterConfig, HttpMethod, ResponseCodeFamily, SkippedOperation,
};

/// Selection criteria applied to the contract
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    /// Paths to include (exact or `prefix*`); empty means all
    pub paths: Vec<String>,
    /// Paths to exclude (exact or `prefix*`)
    pub skip_paths: Vec<String>,
    /// Methods to include; empty means all
    pub methods: Vec<HttpMethod>,
    /// Keep operations declaring at least one response in these families; empty means all
    pub response_codes: Vec<ResponseCodeFamily>,
}

impl CatalogFilter {
    #[must_use]
    pub fn from_config(filter: &FilterConfig) -> Self {
        Self {
            paths: filter.paths.clone(),
            skip_paths: filter.skip_paths.clone(),
            methods: filter.methods.clone(),
            response_codes: filter.response_codes.clone(),
        }
    }

    fn path_excluded(&self, path: &str) -> Option<String> {
        if !self.paths.is_empty() && !self.paths.iter().any(|p| path_matches(p, path)) {
            return Some("path not selected".to_string());
        }
        self.skip_paths
            .iter()
            .find(|p| path_matches(p, path))
            .map(|p| format!("path skipped by '{p}'"))
    }

    fn operation_excluded(&self, op: &ContractOperation) -> Option<String> {
        if !self.methods.is_empty() && !self.methods.contains(&op.method) {
            return Some(format!("method {} not selected", op.method));
        }
        if !self.response_codes.is_empty() {
            let mut declared = op
                .responses
                .iter()
                .filter_map(|r| ResponseCodeFamily::from_response_key(r));
            if !declared.any(|f| self.response_codes.contains(&f)) {
                let wanted: Vec<&str> = self.response_codes.iter().map(|f| f.as_str()).collect();
                return Some(format!("no declared response in {}", wanted.join(", ")));
            }
        }
        None
    }
}

/// `pattern` is either an exact path or a prefix ending in `*`.
fn path_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => pattern == path,
    }
}

/// Operations selected under one path
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPath {
    pub path: String,
    pub operations: Vec<Arc<ContractOperation>>,
}

/// Ordered, filtered sequence of operations to exercise
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationCatalog {
    pub paths: Vec<CatalogPath>,
    pub skipped: Vec<SkippedOperation>,
}

impl OperationCatalog {
    /// Select and order the contract's operations.
    #[must_use]
    pub fn select(contract: &Contract, filter: &CatalogFilter) -> Self {
        let mut sorted: Vec<_> = contract.paths.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut catalog = Self::default();
        for entry in sorted {
            if let Some(reason) = filter.path_excluded(&entry.path) {
                tracing::info!("Skipping path {}: {reason}", entry.path);
                catalog.skip_all(&entry.path, &entry.operations, &reason);
                continue;
            }

            let mut operations = Vec::new();
            for op in &entry.operations {
                match filter.operation_excluded(op) {
                    Some(reason) => {
                        tracing::info!("Skipping {}: {reason}", op.label());
                        catalog.skipped.push(SkippedOperation {
                            path: op.path.clone(),
                            method: op.method,
                            reason,
                        });
                    }
                    None => operations.push(Arc::clone(op)),
                }
            }
            if !operations.is_empty() {
                catalog.paths.push(CatalogPath {
                    path: entry.path.clone(),
                    operations,
                });
            }
        }
        catalog
    }

    fn skip_all(&mut self, path: &str, operations: &[Arc<ContractOperation>], reason: &str) {
        self.skipped
            .extend(operations.iter().map(|op| SkippedOperation {
                path: path.to_string(),
                method: op.method,
                reason: reason.to_string(),
            }));
    }

    /// Selected operations in execution order.
    pub fn operations(&self) -> impl Iterator<Item = &Arc<ContractOperation>> {
        self.paths.iter().flat_map(|p| p.operations.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
