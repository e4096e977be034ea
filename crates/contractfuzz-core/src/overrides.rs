//! Per-path override files: headers, query parameters and reference data
//!
//! Each file is a map whose top-level keys are contract paths or the wildcard
//! key `all`, and whose values are flat key/value maps:
//!
//! ```yaml
//! all:
//!   X-Tenant: acme
//! /pets/{petId}:
//!   X-Tenant: zoo
//!   X-Trace: "1"
//! ```
//!
//! Resolution for a path starts from the wildcard map and overwrites it key by
//! key with the path-specific map. Keys are matched case-insensitively, and the
//! result never depends on the order entries were declared in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::{Config, ConfigLoadError};

/// Wildcard key applying to every path
pub const WILDCARD: &str = "all";

pub type ValueMap = BTreeMap<String, Value>;

/// Wildcard map overwritten by the path-specific map at key granularity.
#[must_use]
pub fn merge(path_specific: &ValueMap, wildcard: &ValueMap) -> ValueMap {
    let mut merged = wildcard.clone();
    merged.extend(
        path_specific
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    merged
}

/// One loaded override file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathOverrides {
    entries: BTreeMap<String, ValueMap>,
}

impl PathOverrides {
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ValueMap)>,
        K: Into<String>,
    {
        let mut out = Self::default();
        for (key, map) in entries {
            out.entries.entry(key.into()).or_default().extend(map);
        }
        out
    }

    /// Load an override file. `None` yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or is not a map of maps
    pub fn load(path: Option<&Path>, kind: &str) -> Result<Self, ConfigLoadError> {
        let Some(path) = path else {
            tracing::debug!("No {kind} file provided");
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigLoadError::Io(path.to_path_buf(), e.to_string()))?;
        let parsed = Self::parse(path, &content)?;
        tracing::info!(
            "{kind} file {} loaded: {} entries",
            path.display(),
            parsed.entries.len()
        );
        Ok(parsed)
    }

    /// Parse override content, choosing the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns error on malformed content or unexpected structure
    pub fn parse(origin: &Path, content: &str) -> Result<Self, ConfigLoadError> {
        let root = parse_structured(origin, content)?;
        let top = match root {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(ConfigLoadError::Shape(
                    origin.to_path_buf(),
                    format!("expected a map of paths, found {}", json_kind(&other)),
                ));
            }
        };

        let mut entries: Vec<(String, ValueMap)> = Vec::with_capacity(top.len());
        for (key, value) in top {
            let map = match value {
                Value::Null => ValueMap::new(),
                Value::Object(inner) => inner.into_iter().collect(),
                other => {
                    return Err(ConfigLoadError::Shape(
                        origin.to_path_buf(),
                        format!("entry '{key}' must be a map, found {}", json_kind(&other)),
                    ));
                }
            };
            entries.push((key, map));
        }
        Ok(Self::from_entries(entries))
    }

    /// Overwrite wildcard entries with the given values.
    #[must_use]
    pub fn with_wildcard_values(mut self, values: &BTreeMap<String, String>) -> Self {
        if values.is_empty() {
            return self;
        }
        let all = self.entries.entry(WILDCARD.to_string()).or_default();
        for (k, v) in values {
            all.insert(k.clone(), Value::String(v.clone()));
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merged values for `current_path`.
    #[must_use]
    pub fn resolve(&self, current_path: &str) -> ValueMap {
        let wildcard = self.collect(WILDCARD);
        if current_path.eq_ignore_ascii_case(WILDCARD) {
            return wildcard;
        }
        merge(&self.collect(current_path), &wildcard)
    }

    /// Union of all entries whose key matches `key` ignoring case.
    /// Iterates in key order so case variants resolve deterministically.
    fn collect(&self, key: &str) -> ValueMap {
        let mut out = ValueMap::new();
        for (k, map) in &self.entries {
            if k.eq_ignore_ascii_case(key) {
                out.extend(map.iter().map(|(a, b)| (a.clone(), b.clone())));
            }
        }
        out
    }
}

/// Resolved text values for one path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathConfig {
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub ref_data: ValueMap,
}

/// All override files of a run, loaded once before fuzzing starts
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    pub headers: PathOverrides,
    pub query_params: PathOverrides,
    pub ref_data: PathOverrides,
    pub url_params: BTreeMap<String, String>,
}

impl OverrideSet {
    /// Load every override file named by the config.
    ///
    /// # Errors
    ///
    /// Any unreadable or malformed file aborts the run
    pub fn load(config: &Config) -> Result<Self, ConfigLoadError> {
        let headers = PathOverrides::load(config.headers_file.as_deref(), "Headers")?
            .with_wildcard_values(&config.headers);
        let query_params = PathOverrides::load(config.query_params_file.as_deref(), "Query Params")?;
        let ref_data = PathOverrides::load(config.ref_data_file.as_deref(), "Reference Data")?;
        if !config.url_params.is_empty() {
            tracing::info!("URL parameters: {:?}", config.url_params);
        }
        Ok(Self {
            headers,
            query_params,
            ref_data,
            url_params: config.url_params.clone(),
        })
    }

    #[must_use]
    pub fn for_path(&self, path: &str) -> PathConfig {
        PathConfig {
            headers: to_text_map(self.headers.resolve(path)),
            query_params: to_text_map(self.query_params.resolve(path)),
            ref_data: self.ref_data.resolve(path),
        }
    }

    /// Replace `{name}` placeholders with configured URL parameters.
    #[must_use]
    pub fn replace_url_params(&self, path: &str) -> String {
        let mut out = path.to_string();
        for (name, value) in &self.url_params {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}

/// Render a JSON scalar the way it travels in a header or query string.
#[must_use]
pub fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn to_text_map(map: ValueMap) -> BTreeMap<String, String> {
    map.into_iter().map(|(k, v)| (k, value_to_text(&v))).collect()
}

fn parse_structured(origin: &Path, content: &str) -> Result<Value, ConfigLoadError> {
    let err = |e: String| ConfigLoadError::Parse(PathBuf::from(origin), e);
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    let ext = origin
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| err(e.to_string())),
        "json" => serde_json::from_str(content).map_err(|e| err(e.to_string())),
        "toml" => toml::from_str(content).map_err(|e| err(e.to_string())),
        _ => {
            if content.trim_start().starts_with('{') {
                serde_json::from_str(content).map_err(|e| err(e.to_string()))
            } else {
                serde_yml::from_str(content).map_err(|e| err(e.to_string()))
            }
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn map(pairs: &[(&str, &str)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn path_entry_wins_over_wildcard() {
        let merged = merge(&map(&[("a", "path")]), &map(&[("a", "all"), ("b", "all")]));
        assert_eq!(merged.get("a"), Some(&json!("path")));
        assert_eq!(merged.get("b"), Some(&json!("all")));
    }

    #[test]
    fn resolve_inherits_missing_keys() {
        let overrides = PathOverrides::from_entries([
            ("all", map(&[("X-Tenant", "acme"), ("X-Env", "dev")])),
            ("/pets", map(&[("X-Tenant", "zoo")])),
        ]);
        let resolved = overrides.resolve("/pets");
        assert_eq!(resolved.get("X-Tenant"), Some(&json!("zoo")));
        assert_eq!(resolved.get("X-Env"), Some(&json!("dev")));

        let other = overrides.resolve("/stores");
        assert_eq!(other.get("X-Tenant"), Some(&json!("acme")));
    }

    #[test]
    fn keys_match_case_insensitively() {
        let overrides = PathOverrides::from_entries([
            ("ALL", map(&[("k", "wild")])),
            ("/Pets", map(&[("p", "1")])),
        ]);
        let resolved = overrides.resolve("/pets");
        assert_eq!(resolved.get("k"), Some(&json!("wild")));
        assert_eq!(resolved.get("p"), Some(&json!("1")));
    }

    #[test]
    fn yaml_declaration_order_does_not_matter() {
        let a = "all:\n  k: wild\n  w: 1\n/pets:\n  k: pets\n";
        let b = "/pets:\n  k: pets\nall:\n  w: 1\n  k: wild\n";
        let pa = PathOverrides::parse(Path::new("a.yml"), a).unwrap();
        let pb = PathOverrides::parse(Path::new("b.yml"), b).unwrap();
        assert_eq!(pa.resolve("/pets"), pb.resolve("/pets"));
        assert_eq!(pa.resolve("/pets").get("k"), Some(&json!("pets")));
    }

    #[test]
    fn parse_rejects_non_map_entries() {
        let err = PathOverrides::parse(Path::new("h.yml"), "all: [1, 2]\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Shape(..)));

        let err = PathOverrides::parse(Path::new("h.yml"), "- a\n- b\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Shape(..)));
    }

    #[test]
    fn parse_rejects_malformed_content() {
        let err = PathOverrides::parse(Path::new("h.json"), "{not json").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse(..)));
    }

    #[test]
    fn parse_toml_and_sniffed_json() {
        let t = PathOverrides::parse(Path::new("q.toml"), "[all]\nlimit = 10\n").unwrap();
        assert_eq!(t.resolve("/x").get("limit"), Some(&json!(10)));

        let j = PathOverrides::parse(Path::new("q.data"), r#"{"all": {"limit": "5"}}"#).unwrap();
        assert_eq!(j.resolve("/x").get("limit"), Some(&json!("5")));
    }

    #[test]
    fn empty_file_yields_empty_overrides() {
        let p = PathOverrides::parse(Path::new("e.yml"), "").unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn inline_headers_win_over_wildcard_file_entry() {
        let file = PathOverrides::from_entries([("all", map(&[("Authorization", "file")]))]);
        let inline: BTreeMap<String, String> =
            [("Authorization".to_string(), "inline".to_string())].into();
        let merged = file.with_wildcard_values(&inline);
        assert_eq!(
            merged.resolve("/any").get("Authorization"),
            Some(&json!("inline"))
        );
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refdata.yml");
        std::fs::write(&path, "/pets:\n  name: rex\n").unwrap();
        let loaded = PathOverrides::load(Some(&path), "Reference Data").unwrap();
        assert_eq!(loaded.resolve("/pets").get("name"), Some(&json!("rex")));

        let missing = PathOverrides::load(Some(&dir.path().join("nope.yml")), "Headers");
        assert!(matches!(missing, Err(ConfigLoadError::Io(..))));
    }

    #[test]
    fn override_set_resolves_all_three_kinds_symmetrically() {
        let set = OverrideSet {
            headers: PathOverrides::from_entries([
                ("all", map(&[("h", "all")])),
                ("/p", map(&[("h", "p")])),
            ]),
            query_params: PathOverrides::from_entries([
                ("all", map(&[("q", "all")])),
                ("/p", map(&[("q", "p")])),
            ]),
            ref_data: PathOverrides::from_entries([
                ("all", map(&[("r", "all")])),
                ("/p", map(&[("r", "p")])),
            ]),
            url_params: BTreeMap::new(),
        };
        let cfg = set.for_path("/p");
        assert_eq!(cfg.headers.get("h").map(String::as_str), Some("p"));
        assert_eq!(cfg.query_params.get("q").map(String::as_str), Some("p"));
        assert_eq!(cfg.ref_data.get("r"), Some(&json!("p")));
    }

    #[test]
    fn url_params_replace_placeholders() {
        let set = OverrideSet {
            url_params: [("petId".to_string(), "7".to_string())].into(),
            ..Default::default()
        };
        assert_eq!(set.replace_url_params("/pets/{petId}/toys"), "/pets/7/toys");
        assert_eq!(set.replace_url_params("/stores/{id}"), "/stores/{id}");
    }

    #[test]
    fn value_to_text_renders_scalars() {
        assert_eq!(value_to_text(&json!("a")), "a");
        assert_eq!(value_to_text(&json!(3)), "3");
        assert_eq!(value_to_text(&json!(true)), "true");
        assert_eq!(value_to_text(&Value::Null), "");
    }

    fn entries_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[a-d]{1,2}", "[a-z0-9]{0,4}"), 0..8)
    }

    proptest! {
        #[test]
        fn merge_prefers_path_entries(path in entries_strategy(), wild in entries_strategy()) {
            let p: ValueMap = path.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let w: ValueMap = wild.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let merged = merge(&p, &w);
            for (k, v) in &p {
                prop_assert_eq!(merged.get(k), Some(v));
            }
            for (k, v) in &w {
                if !p.contains_key(k) {
                    prop_assert_eq!(merged.get(k), Some(v));
                }
            }
            prop_assert_eq!(merged.len(), p.keys().chain(w.keys()).collect::<std::collections::BTreeSet<_>>().len());
        }

        #[test]
        fn merge_is_idempotent(path in entries_strategy(), wild in entries_strategy()) {
            let p: ValueMap = path.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let w: ValueMap = wild.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let once = merge(&p, &w);
            prop_assert_eq!(merge(&p, &once), once.clone());
            prop_assert_eq!(merge(&once, &w), once);
        }

        #[test]
        fn resolution_ignores_declaration_order(
            path in entries_strategy(),
            wild in entries_strategy(),
            rotate in 0usize..4,
        ) {
            let p: ValueMap = path.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let w: ValueMap = wild.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let mut declared = vec![
                ("all".to_string(), w.clone()),
                ("/pets".to_string(), p.clone()),
                ("/stores".to_string(), map(&[("s", "1")])),
            ];
            let forward = PathOverrides::from_entries(declared.clone());
            let len = declared.len();
            declared.rotate_left(rotate % len);
            declared.reverse();
            let shuffled = PathOverrides::from_entries(declared);
            prop_assert_eq!(forward.resolve("/pets"), shuffled.resolve("/pets"));
            prop_assert_eq!(forward.resolve("/pets"), merge(&p, &w));
        }
    }
}
