//! Contract model: the narrow view of an API contract the fuzzer needs
//!
//! Built once by the contract adapter and never mutated afterwards.
//! Operations are shared between fuzz cases through `Arc`.

use std::str::FromStr;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// HTTP method of a contract operation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub const ALL: [Self; 8] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
        Self::Trace,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown HTTP method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Where a field travels in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldLocation {
    Path,
    Query,
    Header,
    Body,
}

/// Declared JSON type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    /// Map a JSON Schema `type` keyword. Unknown or missing types fall back to string.
    #[must_use]
    pub fn from_schema_type(t: Option<&str>) -> Self {
        match t {
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ => Self::String,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

/// Declared constraints of a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Constraints {
    /// Read constraint keywords from a (resolved) JSON Schema.
    ///
    /// Both the boolean (OpenAPI 3.0) and numeric (3.1) forms of
    /// `exclusiveMinimum`/`exclusiveMaximum` are understood.
    #[must_use]
    pub fn from_schema(schema: &Value) -> Self {
        let (minimum, exclusive_minimum) = numeric_limit(schema, "minimum", "exclusiveMinimum");
        let (maximum, exclusive_maximum) = numeric_limit(schema, "maximum", "exclusiveMaximum");
        Self {
            min_length: schema.get("minLength").and_then(Value::as_u64),
            max_length: schema.get("maxLength").and_then(Value::as_u64),
            minimum,
            maximum,
            exclusive_minimum,
            exclusive_maximum,
            enum_values: schema
                .get("enum")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            pattern: schema
                .get("pattern")
                .and_then(Value::as_str)
                .map(String::from),
            format: schema
                .get("format")
                .and_then(Value::as_str)
                .map(String::from),
        }
    }
}

/// `(inclusive, exclusive)` limit for one side of a numeric range
fn numeric_limit(
    schema: &Value,
    inclusive_key: &str,
    exclusive_key: &str,
) -> (Option<f64>, Option<f64>) {
    let inclusive = schema.get(inclusive_key).and_then(Value::as_f64);
    match schema.get(exclusive_key) {
        Some(Value::Bool(true)) => (None, inclusive),
        Some(v) => (inclusive, v.as_f64()),
        None => (inclusive, None),
    }
}

/// A parameter or top-level body property of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub name: String,
    pub location: FieldLocation,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default)]
    pub constraints: Constraints,
}

impl FieldSpec {
    /// Self-contained JSON Schema for this field, used for constraint checks.
    #[must_use]
    pub fn to_schema(&self) -> Value {
        let mut schema = json!({ "type": self.kind.as_str() });
        let c = &self.constraints;
        if let Some(v) = c.min_length {
            schema["minLength"] = json!(v);
        }
        if let Some(v) = c.max_length {
            schema["maxLength"] = json!(v);
        }
        if let Some(v) = c.minimum {
            schema["minimum"] = json!(v);
        }
        if let Some(v) = c.maximum {
            schema["maximum"] = json!(v);
        }
        if let Some(v) = c.exclusive_minimum {
            schema["exclusiveMinimum"] = json!(v);
        }
        if let Some(v) = c.exclusive_maximum {
            schema["exclusiveMaximum"] = json!(v);
        }
        if !c.enum_values.is_empty() {
            schema["enum"] = Value::Array(c.enum_values.clone());
        }
        if let Some(p) = &c.pattern {
            schema["pattern"] = json!(p);
        }
        if let Some(f) = &c.format {
            schema["format"] = json!(f);
        }
        schema
    }

    /// Interpret a textual value the way the service would for this field.
    ///
    /// Headers, query and path values arrive as text, so numeric fields are
    /// parsed. Returns `None` when the text cannot be read as the declared type.
    #[must_use]
    pub fn typed_value(&self, text: &str) -> Option<Value> {
        match self.kind {
            FieldKind::Integer => text.parse::<i64>().ok().map(Value::from),
            FieldKind::Number => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            FieldKind::Boolean => text.parse::<bool>().ok().map(Value::Bool),
            FieldKind::String => Some(Value::String(text.to_string())),
            FieldKind::Array | FieldKind::Object => serde_json::from_str(text).ok(),
        }
    }
}

/// One method on one contract path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContractOperation {
    pub path: String,
    pub method: HttpMethod,
    /// Request content types in declaration order (empty when there is no body)
    #[serde(default)]
    pub content_types: Vec<String>,
    /// Parameters followed by top-level body properties
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Declared response keys: "200", "4XX", "default", ...
    #[serde(default)]
    pub responses: Vec<String>,
    /// Request body schema with `$ref`s resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_schema: Option<Value>,
    #[serde(default)]
    pub body_required: bool,
}

impl ContractOperation {
    /// Label used in logs and reports, e.g. "POST /users"
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    #[must_use]
    pub fn field(&self, name: &str, location: FieldLocation) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.location == location && f.name == name)
    }

    pub fn fields_at(&self, location: FieldLocation) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(move |f| f.location == location)
    }
}

/// All operations declared under one path, methods in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ContractPath {
    pub path: String,
    pub operations: Vec<Arc<ContractOperation>>,
}

/// Parsed contract, paths in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contract {
    pub title: Option<String>,
    pub paths: Vec<ContractPath>,
}

impl Contract {
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.iter().map(|p| p.operations.len()).sum()
    }
}
