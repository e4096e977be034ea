//! Fuzz case assembly: one happy-path request skeleton per operation and
//! supported content type
//!
//! Values come from the configured overrides first and from schema-driven
//! generation otherwise. Generation is seeded per operation so the same
//! contract and config always produce the same cases.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::Value;

use contractfuzz_core::overrides::value_to_text;
use contractfuzz_core::{ContractOperation, FieldLocation, FuzzCase, OverrideSet};

use crate::datagen;
use crate::openapi::is_json_like;

/// Why an operation produced no cases
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationAssemblyError {
    #[error("{operation}: no supported content type among [{}]", types.join(", "))]
    UnsupportedContentTypes {
        operation: String,
        types: Vec<String>,
    },
    #[error("{operation}: unresolved schema reference '{reference}'")]
    UnresolvedRef {
        operation: String,
        reference: String,
    },
}

/// Builds the fuzz cases of one operation
pub trait CaseAssembler {
    /// # Errors
    ///
    /// Returns error when the operation cannot be turned into a request
    fn assemble(&self, op: &Arc<ContractOperation>)
    -> Result<Vec<FuzzCase>, OperationAssemblyError>;
}

/// Override-aware, seeded assembler used by `run`
#[derive(Debug, Clone, Default)]
pub struct DefaultAssembler {
    overrides: OverrideSet,
    seed: u64,
}

impl DefaultAssembler {
    #[must_use]
    pub const fn new(overrides: OverrideSet, seed: u64) -> Self {
        Self { overrides, seed }
    }

    fn rng_for(&self, label: &str) -> SmallRng {
        SmallRng::seed_from_u64(self.seed ^ fnv1a(label))
    }
}

impl CaseAssembler for DefaultAssembler {
    fn assemble(
        &self,
        op: &Arc<ContractOperation>,
    ) -> Result<Vec<FuzzCase>, OperationAssemblyError> {
        let label = op.label();
        if let Some(schema) = &op.body_schema {
            if let Some(reference) = find_ref(schema) {
                return Err(OperationAssemblyError::UnresolvedRef {
                    operation: label,
                    reference,
                });
            }
        }

        let content_types: Vec<Option<String>> = if op.content_types.is_empty() {
            vec![None]
        } else {
            let supported: Vec<_> = op
                .content_types
                .iter()
                .filter(|ct| is_json_like(ct))
                .cloned()
                .map(Some)
                .collect();
            if supported.is_empty() {
                return Err(OperationAssemblyError::UnsupportedContentTypes {
                    operation: label,
                    types: op.content_types.clone(),
                });
            }
            supported
        };

        let resolved = self.overrides.for_path(&op.path);
        let mut cases = Vec::with_capacity(content_types.len());
        for content_type in content_types {
            let mut rng = self.rng_for(&format!("{label} {}", content_type.as_deref().unwrap_or("")));

            let mut path_params = BTreeMap::new();
            for field in op.fields_at(FieldLocation::Path) {
                let value = self
                    .overrides
                    .url_params
                    .get(&field.name)
                    .cloned()
                    .or_else(|| resolved.ref_data.get(&field.name).map(value_to_text))
                    .unwrap_or_else(|| value_to_text(&datagen::generate(&field.to_schema(), &mut rng)));
                path_params.insert(field.name.clone(), value);
            }

            let mut query = BTreeMap::new();
            for field in op.fields_at(FieldLocation::Query).filter(|f| f.required) {
                let value = datagen::generate(&field.to_schema(), &mut rng);
                query.insert(field.name.clone(), value_to_text(&value));
            }
            query.extend(resolved.query_params.clone());

            let mut headers = BTreeMap::new();
            for field in op.fields_at(FieldLocation::Header) {
                let value = datagen::generate(&field.to_schema(), &mut rng);
                headers.insert(field.name.clone(), value_to_text(&value));
            }
            headers.extend(resolved.headers.clone());

            let body = match (&content_type, &op.body_schema) {
                (Some(_), Some(schema)) => {
                    let mut body = datagen::generate(schema, &mut rng);
                    if let Value::Object(obj) = &mut body {
                        for field in op.fields_at(FieldLocation::Body) {
                            if let Some(v) = resolved.ref_data.get(&field.name) {
                                obj.insert(field.name.clone(), v.clone());
                            }
                        }
                    }
                    Some(body)
                }
                _ => None,
            };

            cases.push(FuzzCase {
                operation: Arc::clone(op),
                content_type,
                path_params,
                headers,
                query,
                ref_data: resolved.ref_data.clone(),
                body,
            });
        }
        tracing::debug!("Assembled {} case(s) for {label}", cases.len());
        Ok(cases)
    }
}

fn find_ref(schema: &Value) -> Option<String> {
    match schema {
        Value::Object(map) => map
            .get("$ref")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| map.values().find_map(find_ref)),
        Value::Array(items) => items.iter().find_map(find_ref),
        _ => None,
    }
}

/// Stable 64-bit FNV-1a, so seeds do not depend on the std hasher.
fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}
