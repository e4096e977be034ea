//! Fuzz cases, mutation candidates and the requests built from them
//!
//! A [`FuzzCase`] is assembled once per operation and content type and is only
//! ever read afterwards. Applying a [`MutationCandidate`] produces a fresh
//! [`AssembledRequest`]; the case itself is left untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{ContractOperation, FieldLocation, HttpMethod};
use crate::expectation::Validity;
use crate::overrides::value_to_text;

/// One request skeleton for an operation, before mutation
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzCase {
    pub operation: Arc<ContractOperation>,
    pub content_type: Option<String>,
    pub path_params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub ref_data: BTreeMap<String, Value>,
    pub body: Option<Value>,
}

impl FuzzCase {
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.operation.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.operation.path
    }

    /// Current value of a target, if the case carries one.
    #[must_use]
    pub fn current_value(&self, target: &MutationTarget) -> Option<Value> {
        match target {
            MutationTarget::Header(name) => self
                .headers
                .get(name)
                .map(|v| Value::String(v.clone())),
            MutationTarget::Field { name, location } => match location {
                FieldLocation::Path => self.path_params.get(name).map(|v| Value::String(v.clone())),
                FieldLocation::Query => self.query.get(name).map(|v| Value::String(v.clone())),
                FieldLocation::Header => self.headers.get(name).map(|v| Value::String(v.clone())),
                FieldLocation::Body => self.body.as_ref().and_then(|b| b.get(name)).cloned(),
            },
            MutationTarget::Body => self.body.as_ref().map(|b| Value::String(b.to_string())),
        }
    }

    /// The request this case sends unmodified.
    #[must_use]
    pub fn request(&self) -> AssembledRequest {
        AssembledRequest {
            method: self.method(),
            path: render_path(self.path(), &self.path_params),
            headers: self.request_headers(),
            query: self.query.clone(),
            body: self.body.clone().map(RequestBody::Json),
        }
    }

    /// A new request with the candidate's value substituted.
    #[must_use]
    pub fn apply(&self, candidate: &MutationCandidate) -> AssembledRequest {
        let mut request = self.request();
        let text = value_to_text(&candidate.value);
        match &candidate.target {
            MutationTarget::Header(name) => {
                request.headers.insert(name.clone(), text);
            }
            MutationTarget::Field { name, location } => match location {
                FieldLocation::Header => {
                    request.headers.insert(name.clone(), text);
                }
                FieldLocation::Query => {
                    request.query.insert(name.clone(), text);
                }
                FieldLocation::Path => {
                    let mut params = self.path_params.clone();
                    params.insert(name.clone(), text);
                    request.path = render_path(self.path(), &params);
                }
                FieldLocation::Body => {
                    let mut body = self
                        .body
                        .clone()
                        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                    if let Value::Object(obj) = &mut body {
                        obj.insert(name.clone(), candidate.value.clone());
                    }
                    request.body = Some(RequestBody::Json(body));
                }
            },
            MutationTarget::Body => {
                request.body = Some(RequestBody::Raw(text));
            }
        }
        request
    }

    fn request_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        if let Some(ct) = &self.content_type {
            headers
                .entry("Content-Type".to_string())
                .or_insert_with(|| ct.clone());
        }
        headers
    }
}

fn render_path(template: &str, params: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

/// What a mutation replaces
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MutationTarget {
    /// A request header, declared or configured
    Header(String),
    /// A declared parameter or top-level body property
    Field {
        name: String,
        location: FieldLocation,
    },
    /// The whole request body
    Body,
}

impl std::fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header(name) => write!(f, "header {name}"),
            Self::Field { name, location } => write!(f, "{location:?} field {name}"),
            Self::Body => f.write_str("body"),
        }
    }
}

/// Which side of a declared boundary a value sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPoint {
    Below,
    At,
    Above,
}

/// How a candidate value was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Replace,
    Trail,
    TrimThenValidate,
    Boundary(BoundaryPoint),
}

/// Result of the trim step of a trim-then-validate mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TrimOutcome {
    /// Value left after removing probe characters
    pub intermediate: String,
    /// Whether the intermediate value still satisfies the field's constraints
    pub satisfies_constraints: bool,
}

/// One substitute value; yields exactly one test execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MutationCandidate {
    pub target: MutationTarget,
    pub value: Value,
    pub kind: MutationKind,
    /// Whether the value is acceptable under the target's contract
    pub validity: Validity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimOutcome>,
}

/// Request body as sent on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Raw(String),
}

impl RequestBody {
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Json(v) => v.to_string(),
            Self::Raw(s) => s.clone(),
        }
    }
}

/// Fully assembled request handed to the service invoker
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRequest {
    pub method: HttpMethod,
    /// Path with placeholders substituted
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Constraints, FieldKind, FieldSpec};
    use serde_json::json;

    fn case() -> FuzzCase {
        let op = ContractOperation {
            path: "/pets/{petId}".into(),
            method: HttpMethod::Put,
            content_types: vec!["application/json".into()],
            fields: vec![FieldSpec {
                name: "name".into(),
                location: FieldLocation::Body,
                kind: FieldKind::String,
                required: true,
                constraints: Constraints::default(),
            }],
            responses: vec!["200".into()],
            body_schema: None,
            body_required: true,
        };
        FuzzCase {
            operation: Arc::new(op),
            content_type: Some("application/json".into()),
            path_params: [("petId".to_string(), "7".to_string())].into(),
            headers: [("X-Tenant".to_string(), "acme".to_string())].into(),
            query: BTreeMap::new(),
            ref_data: BTreeMap::new(),
            body: Some(json!({"name": "rex", "age": 3})),
        }
    }

    fn candidate(target: MutationTarget, value: Value) -> MutationCandidate {
        MutationCandidate {
            target,
            value,
            kind: MutationKind::Replace,
            validity: Validity::Invalid,
            trim: None,
        }
    }

    #[test]
    fn request_fills_path_and_content_type() {
        let req = case().request();
        assert_eq!(req.path, "/pets/7");
        assert_eq!(
            req.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(req.body, Some(RequestBody::Json(json!({"name": "rex", "age": 3}))));
    }

    #[test]
    fn apply_body_field_leaves_case_untouched() {
        let c = case();
        let req = c.apply(&candidate(
            MutationTarget::Field {
                name: "name".into(),
                location: FieldLocation::Body,
            },
            json!("rex  "),
        ));
        assert_eq!(
            req.body,
            Some(RequestBody::Json(json!({"name": "rex  ", "age": 3})))
        );
        assert_eq!(c.body, Some(json!({"name": "rex", "age": 3})));
    }

    #[test]
    fn apply_header_and_path_param() {
        let c = case();
        let req = c.apply(&candidate(MutationTarget::Header("X-Tenant".into()), json!(" ")));
        assert_eq!(req.headers.get("X-Tenant").map(String::as_str), Some(" "));

        let req = c.apply(&candidate(
            MutationTarget::Field {
                name: "petId".into(),
                location: FieldLocation::Path,
            },
            json!(-1),
        ));
        assert_eq!(req.path, "/pets/-1");
    }

    #[test]
    fn apply_body_replaces_raw_content() {
        let req = case().apply(&candidate(MutationTarget::Body, json!("")));
        assert_eq!(req.body, Some(RequestBody::Raw(String::new())));
    }

    #[test]
    fn current_value_reads_each_location() {
        let c = case();
        assert_eq!(
            c.current_value(&MutationTarget::Header("X-Tenant".into())),
            Some(json!("acme"))
        );
        assert_eq!(
            c.current_value(&MutationTarget::Field {
                name: "age".into(),
                location: FieldLocation::Body
            }),
            Some(json!(3))
        );
        assert_eq!(
            c.current_value(&MutationTarget::Header("Missing".into())),
            None
        );
    }
}
