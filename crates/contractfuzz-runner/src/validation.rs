//! Field constraint checks backed by `jsonschema`

use serde_json::Value;

use contractfuzz_core::{FieldLocation, FieldSpec};

/// Whether `value` satisfies the field's declared type and constraints.
///
/// Header, query and path values travel as text and are read with the
/// field's declared type first.
#[must_use]
pub fn satisfies(field: &FieldSpec, value: &Value) -> bool {
    let typed = match (field.location, value) {
        (FieldLocation::Body, v) => Some(v.clone()),
        (_, Value::String(text)) => field.typed_value(text),
        (_, v) => Some(v.clone()),
    };
    let Some(typed) = typed else {
        return false;
    };
    match jsonschema::validator_for(&field.to_schema()) {
        Ok(validator) => validator.is_valid(&typed),
        Err(e) => {
            tracing::debug!("Unusable constraints on {}: {e}", field.name);
            true
        }
    }
}

/// Whether a value left after trimming is still acceptable for the field.
///
/// An empty value means the field was effectively omitted: fine for an
/// optional parameter, a violation for a required one. An empty body string
/// is still checked against the property's constraints.
#[must_use]
pub fn satisfies_after_trim(field: &FieldSpec, intermediate: &str) -> bool {
    if intermediate.is_empty() {
        if field.required {
            return false;
        }
        if field.location != FieldLocation::Body {
            return true;
        }
    }
    satisfies(field, &Value::String(intermediate.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractfuzz_core::{Constraints, FieldKind};
    use serde_json::json;

    fn field(location: FieldLocation, kind: FieldKind, required: bool) -> FieldSpec {
        FieldSpec {
            name: "f".into(),
            location,
            kind,
            required,
            constraints: Constraints {
                min_length: Some(2),
                max_length: Some(5),
                minimum: Some(1.0),
                maximum: Some(10.0),
                ..Constraints::default()
            },
        }
    }

    #[test]
    fn length_constraints() {
        let f = field(FieldLocation::Body, FieldKind::String, true);
        assert!(satisfies(&f, &json!("abc")));
        assert!(!satisfies(&f, &json!("a")));
        assert!(!satisfies(&f, &json!("abcdef")));
    }

    #[test]
    fn textual_numbers_are_parsed() {
        let f = field(FieldLocation::Query, FieldKind::Integer, false);
        assert!(satisfies(&f, &json!("7")));
        assert!(!satisfies(&f, &json!("11")));
        assert!(!satisfies(&f, &json!("seven")));
    }

    #[test]
    fn body_numbers_are_not_coerced() {
        let f = field(FieldLocation::Body, FieldKind::Integer, true);
        assert!(satisfies(&f, &json!(5)));
        assert!(!satisfies(&f, &json!("5")));
    }

    #[test]
    fn empty_after_trim() {
        let required = field(FieldLocation::Header, FieldKind::String, true);
        assert!(!satisfies_after_trim(&required, ""));
        let optional = field(FieldLocation::Header, FieldKind::String, false);
        assert!(satisfies_after_trim(&optional, ""));
        let optional_body = field(FieldLocation::Body, FieldKind::String, false);
        assert!(!satisfies_after_trim(&optional_body, ""));
        assert!(satisfies_after_trim(&required, "abc"));
    }
}
