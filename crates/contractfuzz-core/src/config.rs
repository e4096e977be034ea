//! Project configuration for contract fuzzing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::contract::HttpMethod;
use crate::expectation::ResponseCodeFamily;

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI contract path (local file)
    pub contract: PathBuf,

    /// Base URL of the service under test
    pub server: String,

    /// Headers applied to every path. Win over the `all` entry of `headers_file`.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-path headers file (keys: contract paths or `all`)
    #[serde(default)]
    pub headers_file: Option<PathBuf>,

    /// Per-path additional query parameters file
    #[serde(default)]
    pub query_params_file: Option<PathBuf>,

    /// Per-path reference data file: fields that must keep a fixed value
    #[serde(default)]
    pub ref_data_file: Option<PathBuf>,

    /// Values substituted into `{name}` path placeholders
    #[serde(default)]
    pub url_params: BTreeMap<String, String>,

    /// Operation and fuzzer selection
    #[serde(default)]
    pub filter: FilterConfig,

    /// How the service is expected to treat leading/trailing probe characters
    #[serde(default)]
    pub edge_spaces_strategy: EdgeSpacesStrategy,

    /// Check for a newer release in the background
    #[serde(default)]
    pub check_update: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seed for generated request data
    #[serde(default)]
    pub seed: u64,
}

const fn default_timeout_secs() -> u64 {
    10
}

/// Include/exclude filters. Empty lists select everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Paths to run. Exact paths, or a prefix ending in `*`.
    #[serde(default)]
    pub paths: Vec<String>,

    /// Paths to skip, same syntax as `paths`
    #[serde(default)]
    pub skip_paths: Vec<String>,

    /// HTTP methods in scope
    #[serde(default)]
    pub methods: Vec<HttpMethod>,

    /// Keep operations declaring at least one response in these families
    #[serde(default)]
    pub response_codes: Vec<ResponseCodeFamily>,

    /// Fuzzer names to run
    #[serde(default)]
    pub fuzzers: Vec<String>,

    /// Fuzzer names to leave out
    #[serde(default)]
    pub skip_fuzzers: Vec<String>,
}

/// Whether edge characters are trimmed before validation or rejected outright
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSpacesStrategy {
    #[default]
    TrimAndValidate,
    ValidateAndTrim,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract: PathBuf::from("openapi.yaml"),
            server: "http://localhost:8080".to_string(),
            headers: BTreeMap::new(),
            headers_file: None,
            query_params_file: None,
            ref_data_file: None,
            url_params: BTreeMap::new(),
            filter: FilterConfig::default(),
            edge_spaces_strategy: EdgeSpacesStrategy::default(),
            check_update: false,
            timeout_secs: default_timeout_secs(),
            seed: 0,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigLoadError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| ConfigLoadError::Parse(path.to_path_buf(), e.to_string()))
        } else {
            toml::from_str(&content)
                .map_err(|e| ConfigLoadError::Parse(path.to_path_buf(), e.to_string()))
        }
    }

    /// Load from default location (.contractfuzz.toml)
    pub fn load_default() -> Result<Self, ConfigLoadError> {
        let candidates = [
            ".contractfuzz.toml",
            ".contractfuzz.json",
            "contractfuzz.toml",
        ];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# contractfuzz configuration

# OpenAPI contract (local file path)
contract = "openapi.yaml"

# Service under test
server = "http://localhost:8080"

# Per-request timeout in seconds
# timeout_secs = 10

# Headers sent on every path (auth tokens, api keys)
[headers]
Authorization = "Bearer your-token-here"

# Per-path files; top-level keys are contract paths or "all"
# headers_file = "headers.yml"
# query_params_file = "query.yml"
# ref_data_file = "refdata.yml"

# Values for {placeholders} in paths
[url_params]
# petId = "1"

# edge_spaces_strategy = "trim_and_validate"   # or "validate_and_trim"
# check_update = true

[filter]
# paths = ["/pets", "/stores/*"]
# skip_paths = ["/health"]
# methods = ["POST", "PUT"]
# response_codes = ["2XX"]
# fuzzers = ["OnlySpacesInHeadersFuzzer"]
# skip_fuzzers = ["EmptyBodyFuzzer"]
"#
    }
}

/// Failure to load configuration or an override file. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error in {0}: {1}")]
    Parse(PathBuf, String),
    #[error("Invalid structure in {0}: {1}")]
    Shape(PathBuf, String),
}
