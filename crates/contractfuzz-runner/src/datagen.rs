//! JSON Schema → schema-valid `serde_json::Value` generator
//!
//! Feeds the case assembler with happy-path data that mutations then
//! perturb one target at a time. Handles the OpenAPI 3.x subset:
//! string, integer, number, boolean, array, object, enum, anyOf, oneOf, allOf.
//! Schemas are expected to be `$ref`-free already.

use rand::Rng;
use serde_json::{Value, json};

/// Maximum recursion depth for schema traversal.
const MAX_DEPTH: u32 = 20;

/// Upper bound for generated string lengths.
pub(crate) const MAX_STRING_LEN: usize = 10_000;

/// Upper bound for generated array lengths.
const MAX_ARRAY_ITEMS: usize = 100;

/// Generate a JSON value conforming to `schema`.
pub fn generate(schema: &Value, rng: &mut impl Rng) -> Value {
    generate_inner(schema, rng, 0)
}

fn generate_inner(schema: &Value, rng: &mut impl Rng, depth: u32) -> Value {
    if depth > MAX_DEPTH {
        return Value::Null;
    }

    if let Some(example) = schema.get("example") {
        return example.clone();
    }

    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        if !values.is_empty() {
            return values[rng.gen_range(0..values.len())].clone();
        }
    }

    // anyOf / oneOf: pick one non-null variant
    for key in ["anyOf", "oneOf"] {
        if let Some(variants) = schema.get(key).and_then(Value::as_array) {
            let non_null: Vec<_> = variants
                .iter()
                .filter(|s| s.get("type").and_then(Value::as_str) != Some("null"))
                .collect();
            if non_null.is_empty() {
                return Value::Null;
            }
            return generate_inner(non_null[rng.gen_range(0..non_null.len())], rng, depth + 1);
        }
    }

    // allOf: merge objects
    if let Some(all_of) = schema.get("allOf").and_then(Value::as_array) {
        let mut merged = serde_json::Map::new();
        for sub in all_of {
            if let Value::Object(obj) = generate_inner(sub, rng, depth + 1) {
                merged.extend(obj);
            }
        }
        return Value::Object(merged);
    }

    match schema.get("type").and_then(Value::as_str).unwrap_or("") {
        "string" => gen_string(schema, rng),
        "integer" => gen_integer(schema, rng),
        "number" => gen_number(schema, rng),
        "boolean" => Value::Bool(rng.gen_bool(0.5)),
        "array" => gen_array(schema, rng, depth + 1),
        "object" => gen_object(schema, rng, depth + 1),
        _ if schema.get("properties").is_some() => gen_object(schema, rng, depth + 1),
        _ => Value::String(random_alnum(rng, 8)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn gen_string(schema: &Value, rng: &mut impl Rng) -> Value {
    let format = schema.get("format").and_then(Value::as_str);
    match format {
        Some("email") => Value::String(format!("user{}@example.com", rng.gen_range(1..9999_u32))),
        Some("uri" | "url") => Value::String("https://example.com".into()),
        Some("date") => Value::String("2024-01-15".into()),
        Some("date-time") => Value::String("2024-01-15T12:00:00Z".into()),
        Some("uuid") => Value::String(format!(
            "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
            rng.r#gen::<u32>(),
            rng.r#gen::<u16>(),
            rng.r#gen::<u16>() & 0x0FFF,
            (rng.r#gen::<u16>() & 0x3FFF) | 0x8000,
            rng.r#gen::<u64>() & 0xFFFF_FFFF_FFFF,
        )),
        _ => {
            let min = schema
                .get("minLength")
                .and_then(Value::as_u64)
                .map_or(1, |v| (v as usize).min(MAX_STRING_LEN));
            let max = schema
                .get("maxLength")
                .and_then(Value::as_u64)
                .map_or(20, |v| (v as usize).min(MAX_STRING_LEN));
            let len = rng.gen_range(min..=max.max(min));
            Value::String(random_alnum(rng, len))
        }
    }
}

/// One side of a numeric range: the limit and whether it is exclusive.
///
/// Reads both `exclusiveMinimum: true` (OpenAPI 3.0) and
/// `exclusiveMinimum: 5` (3.1). Non-finite limits are ignored.
fn numeric_limit(
    schema: &Value,
    inclusive_key: &str,
    exclusive_key: &str,
) -> Option<(f64, bool)> {
    let inclusive = schema.get(inclusive_key).and_then(Value::as_f64);
    let limit = match schema.get(exclusive_key) {
        Some(Value::Bool(true)) => inclusive.map(|v| (v, true)),
        Some(v) => v.as_f64().map(|v| (v, true)).or(inclusive.map(|v| (v, false))),
        None => inclusive.map(|v| (v, false)),
    };
    limit.filter(|(v, _)| v.is_finite())
}

/// Integer limit rounded inward; an exclusive limit moves one step in.
#[allow(clippy::cast_possible_truncation)]
fn integer_limit(
    schema: &Value,
    inclusive_key: &str,
    exclusive_key: &str,
    round: fn(f64) -> f64,
    step: i64,
) -> Option<i64> {
    let (limit, exclusive) = numeric_limit(schema, inclusive_key, exclusive_key)?;
    let rounded = round(limit);
    let v = rounded as i64;
    Some(if exclusive && rounded == limit {
        v.saturating_add(step)
    } else {
        v
    })
}

fn gen_integer(schema: &Value, rng: &mut impl Rng) -> Value {
    let min = integer_limit(schema, "minimum", "exclusiveMinimum", f64::ceil, 1).unwrap_or(1);
    let max = integer_limit(schema, "maximum", "exclusiveMaximum", f64::floor, -1)
        .unwrap_or_else(|| min.saturating_add(1000));
    Value::Number(rng.gen_range(min..=max.max(min)).into())
}

/// Sampling needs a span `rand` can scale without overflowing; wider ranges
/// get their midpoint.
fn gen_number(schema: &Value, rng: &mut impl Rng) -> Value {
    let lower = numeric_limit(schema, "minimum", "exclusiveMinimum");
    let upper = numeric_limit(schema, "maximum", "exclusiveMaximum");
    let min = lower.map_or(0.0, |(v, _)| v);
    let max = upper.map_or(min + 1000.0, |(v, _)| v);
    if max <= min || !max.is_finite() {
        return json!(min);
    }
    let midpoint = min / 2.0 + max / 2.0;
    let span = max - min;
    if !span.is_finite() || span > f64::MAX / 4.0 {
        return json!(midpoint);
    }
    let v = rng.gen_range(min..=max);
    let hits_exclusive = |limit: Option<(f64, bool)>| limit.is_some_and(|(l, ex)| ex && v == l);
    if hits_exclusive(lower) || hits_exclusive(upper) {
        return json!(midpoint);
    }
    json!(v)
}

fn gen_array(schema: &Value, rng: &mut impl Rng, depth: u32) -> Value {
    let bound = |key: &str, default: u64| {
        let v = schema.get(key).and_then(Value::as_u64).unwrap_or(default);
        usize::try_from(v).map_or(MAX_ARRAY_ITEMS, |v| v.min(MAX_ARRAY_ITEMS))
    };
    let min = bound("minItems", 1);
    let max = bound("maxItems", 3);
    let count = rng.gen_range(min..=max.max(min));
    let items_schema = schema
        .get("items")
        .cloned()
        .unwrap_or_else(|| json!({"type": "string"}));
    Value::Array(
        (0..count)
            .map(|_| generate_inner(&items_schema, rng, depth))
            .collect(),
    )
}

/// Every declared property is generated so each one can be mutated.
fn gen_object(schema: &Value, rng: &mut impl Rng, depth: u32) -> Value {
    let mut obj = serde_json::Map::new();
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (key, prop_schema) in props {
            obj.insert(key.clone(), generate_inner(prop_schema, rng, depth));
        }
    }
    Value::Object(obj)
}

fn random_alnum(rng: &mut impl Rng, len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn valid(schema: &Value, value: &Value) -> bool {
        jsonschema::validator_for(schema).unwrap().is_valid(value)
    }

    #[test]
    fn gen_string_respects_length() {
        let schema = json!({"type": "string", "minLength": 5, "maxLength": 10});
        let mut r = rng();
        for _ in 0..50 {
            let len = generate(&schema, &mut r).as_str().unwrap().len();
            assert!((5..=10).contains(&len));
        }
    }

    #[test]
    fn gen_string_email() {
        let v = generate(&json!({"type": "string", "format": "email"}), &mut rng());
        assert!(v.as_str().unwrap().contains('@'));
    }

    #[test]
    fn gen_integer_range() {
        let schema = json!({"type": "integer", "minimum": 1, "maximum": 10});
        let mut r = rng();
        for _ in 0..100 {
            let n = generate(&schema, &mut r).as_i64().unwrap();
            assert!((1..=10).contains(&n));
        }
    }

    #[test]
    fn gen_integer_accepts_float_bounds() {
        let schema = json!({"type": "integer", "minimum": 2.0, "maximum": 4.0});
        let mut r = rng();
        for _ in 0..20 {
            let n = generate(&schema, &mut r).as_i64().unwrap();
            assert!((2..=4).contains(&n));
        }
    }

    #[test]
    fn gen_number_survives_extreme_ranges() {
        let mut r = rng();
        let wide = json!({"type": "number", "minimum": 0, "maximum": f64::MAX});
        let v = generate(&wide, &mut r).as_f64().unwrap();
        assert!(v.is_finite() && v >= 0.0);

        let negative_wide = json!({"type": "number", "minimum": f64::MIN, "maximum": f64::MAX});
        assert!(generate(&negative_wide, &mut r).as_f64().unwrap().is_finite());

        let near_max = json!({"type": "number", "minimum": 1.7e308});
        assert_eq!(generate(&near_max, &mut r).as_f64(), Some(1.7e308));
    }

    #[test]
    fn exclusive_limits_are_respected() {
        let schema = json!({
            "type": "integer",
            "minimum": 1,
            "exclusiveMinimum": true,
            "exclusiveMaximum": 3
        });
        let mut r = rng();
        for _ in 0..20 {
            assert_eq!(generate(&schema, &mut r).as_i64(), Some(2));
        }
        let number = json!({"type": "number", "exclusiveMinimum": 0, "maximum": 1});
        for _ in 0..20 {
            let v = generate(&number, &mut r);
            assert!(valid(&number, &v), "{v}");
        }
    }

    #[test]
    fn huge_min_items_is_capped() {
        let schema = json!({
            "type": "array",
            "minItems": 1_000_000_000_u64,
            "items": {"type": "boolean"}
        });
        let v = generate(&schema, &mut rng());
        assert_eq!(v.as_array().unwrap().len(), MAX_ARRAY_ITEMS);
    }

    #[test]
    fn gen_object_fills_every_property() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string", "maxLength": 20},
                "age": {"type": "integer", "minimum": 0, "maximum": 30},
                "tags": {"type": "array", "items": {"type": "string"}},
                "kind": {"enum": ["cat", "dog"]}
            }
        });
        let v = generate(&schema, &mut rng());
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert!(valid(&schema, &v));
    }

    #[test]
    fn gen_all_of_merges() {
        let schema = json!({"allOf": [
            {"type": "object", "properties": {"a": {"type": "string"}}},
            {"type": "object", "properties": {"b": {"type": "integer"}}}
        ]});
        let v = generate(&schema, &mut rng());
        assert!(v.get("a").is_some());
        assert!(v.get("b").is_some());
    }

    #[test]
    fn example_wins() {
        let v = generate(&json!({"type": "string", "example": "rex"}), &mut rng());
        assert_eq!(v, json!("rex"));
    }

    #[test]
    fn same_seed_same_value() {
        let schema = json!({"type": "object", "properties": {
            "id": {"type": "string", "format": "uuid"},
            "n": {"type": "number"}
        }});
        assert_eq!(generate(&schema, &mut rng()), generate(&schema, &mut rng()));
    }
}
