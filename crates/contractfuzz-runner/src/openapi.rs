//! OpenAPI contract adapter: document → [`Contract`]
//!
//! Reads the narrow slice of an OpenAPI 3 document the fuzzer needs. Paths
//! and methods keep their declaration order; ordering policy belongs to the
//! operation catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value, json};

use contractfuzz_core::{
    Constraints, Contract, ContractOperation, ContractPath, FieldKind, FieldLocation, FieldSpec,
    HttpMethod,
};

/// Failure to read or interpret the contract. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ContractParseError {
    #[error("Cannot read contract {0}: {1}")]
    Io(PathBuf, String),
    #[error("Invalid contract {0}: {1}")]
    Parse(PathBuf, String),
    #[error("Contract {0} declares no paths")]
    MissingPaths(PathBuf),
}

/// Read and parse the contract at `path`.
///
/// # Errors
///
/// Returns error if the file cannot be read, is not valid JSON/YAML, or has no `paths`
pub fn load_contract(path: &Path) -> Result<Contract, ContractParseError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ContractParseError::Io(path.to_path_buf(), e.to_string()))?;
    parse_contract(path, &content)
}

/// Parse contract text; `origin` picks the format and labels errors.
///
/// # Errors
///
/// Returns error if the text is not valid JSON/YAML or has no `paths`
pub fn parse_contract(origin: &Path, content: &str) -> Result<Contract, ContractParseError> {
    let doc = parse_document(origin, content)?;
    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| ContractParseError::MissingPaths(origin.to_path_buf()))?;

    let title = doc
        .pointer("/info/title")
        .and_then(Value::as_str)
        .map(String::from);

    let mut contract = Contract {
        title,
        paths: Vec::with_capacity(paths.len()),
    };
    for (path, item) in paths {
        let item = resolve_refs(item, &doc);
        let operations = extract_operations(path, &item);
        contract.paths.push(ContractPath {
            path: path.clone(),
            operations,
        });
    }

    tracing::debug!(
        "Contract parsed: {} paths, {} operations",
        contract.paths.len(),
        contract.operation_count()
    );
    Ok(contract)
}

/// Parse an OpenAPI document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then fall
/// back to content sniffing (leading `{` → JSON, otherwise YAML).
fn parse_document(path: &Path, content: &str) -> Result<Value, ContractParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let err = |kind: &str, e: String| {
        ContractParseError::Parse(path.to_path_buf(), format!("Invalid {kind}: {e}"))
    };
    let as_json = |c: &str| -> Result<Value, ContractParseError> {
        serde_json::from_str(c).map_err(|e| err("JSON", e.to_string()))
    };
    let as_yaml = |c: &str| -> Result<Value, ContractParseError> {
        serde_yml::from_str(c).map_err(|e| err("YAML", e.to_string()))
    };

    match ext.as_str() {
        "yaml" | "yml" => as_yaml(content),
        "json" => as_json(content),
        _ if content.trim_start().starts_with('{') => as_json(content),
        _ => as_yaml(content),
    }
}

fn extract_operations(path: &str, item: &Value) -> Vec<Arc<ContractOperation>> {
    let Some(item) = item.as_object() else {
        return Vec::new();
    };
    let shared_params = item.get("parameters");

    let mut ops = Vec::new();
    for (key, operation) in item {
        let Ok(method) = key.parse::<HttpMethod>() else {
            continue;
        };

        // Operation-level parameters replace path-level ones with the same name and location
        let mut fields: Vec<FieldSpec> = Vec::new();
        for source in [shared_params, operation.get("parameters")].into_iter().flatten() {
            for param in source.as_array().into_iter().flatten() {
                if let Some(f) = parse_parameter(param) {
                    fields.retain(|e| !(e.name == f.name && e.location == f.location));
                    fields.push(f);
                }
            }
        }

        let body = operation.get("requestBody");
        let content = body
            .and_then(|b| b.get("content"))
            .and_then(Value::as_object);
        let content_types: Vec<String> = content
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        let body_schema = content.and_then(|c| {
            c.iter()
                .find(|(ct, _)| is_json_like(ct))
                .or_else(|| c.iter().next())
                .and_then(|(_, media)| media.get("schema"))
                .cloned()
        });
        let body_required = body
            .and_then(|b| b.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(schema) = &body_schema {
            fields.extend(body_fields(schema));
        }

        let responses = operation
            .get("responses")
            .and_then(Value::as_object)
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();

        tracing::trace!("{method} {path}: {} fields", fields.len());
        ops.push(Arc::new(ContractOperation {
            path: path.to_string(),
            method,
            content_types,
            fields,
            responses,
            body_schema,
            body_required,
        }));
    }
    ops
}

fn parse_parameter(param: &Value) -> Option<FieldSpec> {
    let name = param.get("name")?.as_str()?.to_string();
    let location = match param.get("in")?.as_str()? {
        "path" => FieldLocation::Path,
        "query" => FieldLocation::Query,
        "header" => FieldLocation::Header,
        _ => return None,
    };
    let schema = param
        .get("schema")
        .cloned()
        .unwrap_or_else(|| json!({"type": "string"}));
    let required = location == FieldLocation::Path
        || param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

    Some(FieldSpec {
        name,
        location,
        kind: FieldKind::from_schema_type(schema.get("type").and_then(Value::as_str)),
        required,
        constraints: Constraints::from_schema(&schema),
    })
}

/// Top-level properties of an object body schema, `allOf` members merged.
fn body_fields(schema: &Value) -> Vec<FieldSpec> {
    let mut properties = Map::new();
    let mut required: Vec<&str> = Vec::new();
    let parts: Vec<&Value> = match schema.get("allOf").and_then(Value::as_array) {
        Some(all) => all.iter().collect(),
        None => vec![schema],
    };
    for part in parts {
        if let Some(props) = part.get("properties").and_then(Value::as_object) {
            properties.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(req) = part.get("required").and_then(Value::as_array) {
            required.extend(req.iter().filter_map(Value::as_str));
        }
    }

    properties
        .iter()
        .map(|(name, prop)| FieldSpec {
            name: name.clone(),
            location: FieldLocation::Body,
            kind: FieldKind::from_schema_type(prop.get("type").and_then(Value::as_str)),
            required: required.contains(&name.as_str()),
            constraints: Constraints::from_schema(prop),
        })
        .collect()
}

/// Request content types the assembler can build a body for.
#[must_use]
pub fn is_json_like(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json") || essence == "*/*"
}

/// Look up a local reference such as `#/components/schemas/Pet`.
pub(crate) fn resolve_ref(reference: &str, doc: &Value) -> Option<Value> {
    let pointer = reference.strip_prefix('#')?;
    doc.pointer(pointer).cloned()
}

/// Recursively inline `$ref`s against the document.
///
/// A reference back into a schema that is already being expanded becomes an
/// open object. An unresolvable reference is left in place for the assembler
/// to report.
fn resolve_refs(value: &Value, doc: &Value) -> Value {
    resolve_refs_inner(value, doc, &mut Vec::new())
}

fn resolve_refs_inner(value: &Value, doc: &Value, stack: &mut Vec<String>) -> Value {
    match value {
        Value::Object(obj) => {
            if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                if stack.iter().any(|r| r == reference) {
                    return json!({"type": "object"});
                }
                let Some(target) = resolve_ref(reference, doc) else {
                    return value.clone();
                };
                stack.push(reference.to_string());
                let resolved = resolve_refs_inner(&target, doc, stack);
                stack.pop();
                return resolved;
            }
            Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), resolve_refs_inner(v, doc, stack)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|v| resolve_refs_inner(v, doc, stack))
                .collect(),
        ),
        _ => value.clone(),
    }
}
