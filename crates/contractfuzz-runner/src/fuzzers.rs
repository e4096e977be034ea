//! Fuzzer registry: built-in descriptor table plus phase-2 fuzzers
//!
//! Phase-1 fuzzers differ only in data (scenario, target scope, strategy,
//! expectation), so they are rows of [`BUILTIN`] driven by one
//! [`DescriptorFuzzer`]. Activation is a typed predicate over the resolved
//! [`Config`], evaluated once at startup.

use contractfuzz_core::{
    AssembledRequest, Config, EdgeSpacesStrategy, ExpectationRule, FieldKind, FieldLocation,
    FuzzCase, HttpMethod, MutationTarget, ProbeCategory, ResponseCodeFamily, Validity,
};

use crate::scheduler::{Execution, TestSpec};
use crate::strategy::{
    Bound, BoundaryFromConstraint, EdgePlacement, MutationSite, MutationStrategy, ProbeSource,
    Replace, Trail, TrimThenValidate,
};

/// Failure of one fuzzer on one case (or one path, in phase 2)
#[derive(Debug, thiserror::Error)]
pub enum FuzzerExecutionError {
    #[error("{fuzzer} failed: {message}")]
    Failed { fuzzer: String, message: String },
    #[error("{fuzzer} panicked: {message}")]
    Panicked { fuzzer: String, message: String },
}

/// Phase-1 fuzzer: runs once per assembled case
pub trait Fuzzer {
    fn name(&self) -> &str;
    fn scenario(&self) -> &str;
    /// Methods this fuzzer must never run against
    fn skip_methods(&self) -> &[HttpMethod] {
        &[]
    }
    /// Run every candidate of this fuzzer against `case`.
    ///
    /// # Errors
    ///
    /// Returns error when the fuzzer cannot produce its tests for this case
    fn fuzz(&self, case: &FuzzCase, exec: &mut Execution<'_>) -> Result<(), FuzzerExecutionError>;
}

/// Phase-2 fuzzer: runs once per path after every phase-1 pair finished
pub trait PathFuzzer {
    fn name(&self) -> &str;
    fn scenario(&self) -> &str;
    /// # Errors
    ///
    /// Returns error when the fuzzer cannot produce its tests for this path
    fn fuzz_path(
        &self,
        cases: &[FuzzCase],
        exec: &mut Execution<'_>,
    ) -> Result<(), FuzzerExecutionError>;
}

/// Which spots of a case a descriptor mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScope {
    /// The whole request body, when the case carries a content type
    Body,
    /// Contract-declared header parameters
    Headers,
    /// String body properties and query parameters
    StringFields,
    /// Integer/number body properties and query parameters
    NumericFields,
}

impl TargetScope {
    #[must_use]
    pub fn sites(self, case: &FuzzCase) -> Vec<MutationSite> {
        let op = &case.operation;
        match self {
            Self::Body => case
                .content_type
                .as_ref()
                .map(|_| MutationSite {
                    target: MutationTarget::Body,
                    field: None,
                    current: case.body.clone(),
                })
                .into_iter()
                .collect(),
            Self::Headers => op
                .fields_at(FieldLocation::Header)
                .map(|f| {
                    let target = MutationTarget::Header(f.name.clone());
                    MutationSite {
                        current: case.current_value(&target),
                        target,
                        field: Some(f.clone()),
                    }
                })
                .collect(),
            Self::StringFields | Self::NumericFields => op
                .fields
                .iter()
                .filter(|f| matches!(f.location, FieldLocation::Body | FieldLocation::Query))
                .filter(|f| {
                    if self == Self::StringFields {
                        f.kind == FieldKind::String
                    } else {
                        f.kind.is_numeric()
                    }
                })
                .filter(|f| f.location == FieldLocation::Query || case.content_type.is_some())
                .map(|f| {
                    let target = MutationTarget::Field {
                        name: f.name.clone(),
                        location: f.location,
                    };
                    MutationSite {
                        current: case.current_value(&target),
                        target,
                        field: Some(f.clone()),
                    }
                })
                .collect(),
        }
    }
}

/// Recipe for a descriptor's mutation strategy
#[derive(Debug, Clone, Copy)]
pub enum StrategySpec {
    Replace(ProbeSource, Validity),
    Trail(ProbeSource, Validity),
    TrimThenValidate(ProbeCategory, EdgePlacement),
    Boundary(Bound),
}

impl StrategySpec {
    #[must_use]
    pub fn build(self) -> Box<dyn MutationStrategy> {
        match self {
            Self::Replace(source, validity) => Box::new(Replace { source, validity }),
            Self::Trail(source, validity) => Box::new(Trail { source, validity }),
            Self::TrimThenValidate(category, placement) => {
                Box::new(TrimThenValidate { category, placement })
            }
            Self::Boundary(bound) => Box::new(BoundaryFromConstraint { bound }),
        }
    }
}

/// One row of the fuzzer table
#[derive(Debug, Clone, Copy)]
pub struct FuzzerDescriptor {
    pub name: &'static str,
    pub scenario: &'static str,
    pub scope: TargetScope,
    pub strategy: StrategySpec,
    pub expectation: ExpectationRule,
    pub skip_methods: &'static [HttpMethod],
    pub enabled: fn(&Config) -> bool,
}

fn always(_: &Config) -> bool {
    true
}

fn trims_then_validates(config: &Config) -> bool {
    config.edge_spaces_strategy == EdgeSpacesStrategy::TrimAndValidate
}

fn validates_then_trims(config: &Config) -> bool {
    config.edge_spaces_strategy == EdgeSpacesStrategy::ValidateAndTrim
}

const CLIENT_ERROR: ExpectationRule = ExpectationRule::Fixed(ResponseCodeFamily::ClientError);

/// Built-in phase-1 fuzzers in registration order
pub const BUILTIN: &[FuzzerDescriptor] = &[
    FuzzerDescriptor {
        name: "EmptyBodyFuzzer",
        scenario: "Send a request with an empty string body",
        scope: TargetScope::Body,
        strategy: StrategySpec::Replace(ProbeSource::Fixed(&[""]), Validity::Invalid),
        expectation: CLIENT_ERROR,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: always,
    },
    FuzzerDescriptor {
        name: "OnlySpacesInHeadersFuzzer",
        scenario: "Send only spaces in headers",
        scope: TargetScope::Headers,
        strategy: StrategySpec::Replace(
            ProbeSource::Catalog(ProbeCategory::Whitespace),
            Validity::Invalid,
        ),
        expectation: ExpectationRule::ByRequiredness {
            required: ResponseCodeFamily::ClientError,
            optional: ResponseCodeFamily::Success,
        },
        skip_methods: &[],
        enabled: always,
    },
    FuzzerDescriptor {
        name: "OnlyControlCharsInHeadersTrimValidateFuzzer",
        scenario: "Send only control characters in headers",
        scope: TargetScope::Headers,
        strategy: StrategySpec::TrimThenValidate(
            ProbeCategory::ControlChars,
            EdgePlacement::Replace,
        ),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[],
        enabled: trims_then_validates,
    },
    FuzzerDescriptor {
        name: "OnlyInvisibleCharsInHeadersTrimValidateFuzzer",
        scenario: "Send only zero-width characters in headers",
        scope: TargetScope::Headers,
        strategy: StrategySpec::TrimThenValidate(
            ProbeCategory::InvisibleChars,
            EdgePlacement::Replace,
        ),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[],
        enabled: trims_then_validates,
    },
    FuzzerDescriptor {
        name: "TrailingMultiCodePointEmojisInFieldsTrimValidateFuzzer",
        scenario: "Trail string fields with multi code point emojis",
        scope: TargetScope::StringFields,
        strategy: StrategySpec::TrimThenValidate(
            ProbeCategory::MultiCodePointEmojis,
            EdgePlacement::Trail,
        ),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: trims_then_validates,
    },
    FuzzerDescriptor {
        name: "TrailingSpacesInFieldsTrimValidateFuzzer",
        scenario: "Trail string fields with spaces",
        scope: TargetScope::StringFields,
        strategy: StrategySpec::TrimThenValidate(ProbeCategory::Whitespace, EdgePlacement::Trail),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: trims_then_validates,
    },
    FuzzerDescriptor {
        name: "TrailingMultiCodePointEmojisInFieldsValidateTrimFuzzer",
        scenario: "Trail string fields with multi code point emojis, expecting rejection",
        scope: TargetScope::StringFields,
        strategy: StrategySpec::Trail(
            ProbeSource::Catalog(ProbeCategory::MultiCodePointEmojis),
            Validity::Invalid,
        ),
        expectation: CLIENT_ERROR,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: validates_then_trims,
    },
    FuzzerDescriptor {
        name: "TrailingSpacesInFieldsValidateTrimFuzzer",
        scenario: "Trail string fields with spaces, expecting rejection",
        scope: TargetScope::StringFields,
        strategy: StrategySpec::Trail(
            ProbeSource::Catalog(ProbeCategory::Whitespace),
            Validity::Invalid,
        ),
        expectation: CLIENT_ERROR,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: validates_then_trims,
    },
    FuzzerDescriptor {
        name: "MaxLengthExactValuesInStringFieldsFuzzer",
        scenario: "Send values around the declared maxLength of string fields",
        scope: TargetScope::StringFields,
        strategy: StrategySpec::Boundary(Bound::MaxLength),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: always,
    },
    FuzzerDescriptor {
        name: "MinLengthExactValuesInStringFieldsFuzzer",
        scenario: "Send values around the declared minLength of string fields",
        scope: TargetScope::StringFields,
        strategy: StrategySpec::Boundary(Bound::MinLength),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: always,
    },
    FuzzerDescriptor {
        name: "MaximumExactValuesInNumericFieldsFuzzer",
        scenario: "Send values around the declared maximum of numeric fields",
        scope: TargetScope::NumericFields,
        strategy: StrategySpec::Boundary(Bound::Maximum),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: always,
    },
    FuzzerDescriptor {
        name: "MinimumExactValuesInNumericFieldsFuzzer",
        scenario: "Send values around the declared minimum of numeric fields",
        scope: TargetScope::NumericFields,
        strategy: StrategySpec::Boundary(Bound::Minimum),
        expectation: ExpectationRule::ByValidity,
        skip_methods: &[HttpMethod::Get, HttpMethod::Delete, HttpMethod::Head],
        enabled: always,
    },
];

/// The one parametrized phase-1 fuzzer type
pub struct DescriptorFuzzer {
    descriptor: FuzzerDescriptor,
    strategy: Box<dyn MutationStrategy>,
}

impl DescriptorFuzzer {
    #[must_use]
    pub fn new(descriptor: FuzzerDescriptor) -> Self {
        Self {
            strategy: descriptor.strategy.build(),
            descriptor,
        }
    }

    #[must_use]
    pub const fn descriptor(&self) -> &FuzzerDescriptor {
        &self.descriptor
    }
}

impl Fuzzer for DescriptorFuzzer {
    fn name(&self) -> &str {
        self.descriptor.name
    }

    fn scenario(&self) -> &str {
        self.descriptor.scenario
    }

    fn skip_methods(&self) -> &[HttpMethod] {
        self.descriptor.skip_methods
    }

    fn fuzz(&self, case: &FuzzCase, exec: &mut Execution<'_>) -> Result<(), FuzzerExecutionError> {
        let sites = self.descriptor.scope.sites(case);
        if sites.is_empty() {
            tracing::debug!("{}: nothing to mutate in {}", self.name(), case.operation.label());
        }
        for site in &sites {
            let required = site
                .field
                .as_ref()
                .map_or(case.operation.body_required, |f| f.required);
            for candidate in self.strategy.candidates(site) {
                let expected = exec
                    .engine()
                    .expect(self.descriptor.expectation, required, candidate.validity);
                let note = candidate.trim.as_ref().map(|t| {
                    let verdict = if t.satisfies_constraints {
                        "still valid"
                    } else {
                        "violates constraints"
                    };
                    format!("trimmed to {:?}, {verdict}", t.intermediate)
                });
                exec.execute(TestSpec {
                    scenario: format!("{} [{}]", self.descriptor.scenario, site.target),
                    request: case.apply(&candidate),
                    expected,
                    note,
                });
            }
        }
        Ok(())
    }
}

/// Re-requests every resource a successful DELETE removed during phase 1
#[derive(Debug, Default, Clone, Copy)]
pub struct DeletedResourcesFuzzer;

impl DeletedResourcesFuzzer {
    pub const NAME: &'static str = "CheckDeletedResourcesNotAvailableFuzzer";
    const SCENARIO: &'static str =
        "Check that a resource is no longer available after a successful DELETE";
}

impl PathFuzzer for DeletedResourcesFuzzer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn scenario(&self) -> &str {
        Self::SCENARIO
    }

    fn fuzz_path(
        &self,
        cases: &[FuzzCase],
        exec: &mut Execution<'_>,
    ) -> Result<(), FuzzerExecutionError> {
        let deleted: Vec<AssembledRequest> = exec.history().deleted.clone();
        if deleted.is_empty() {
            tracing::debug!("{}: no successful DELETE on this path", Self::NAME);
            return Ok(());
        }
        let Some(get) = cases.iter().find(|c| c.method() == HttpMethod::Get) else {
            tracing::info!("{}: path declares no GET, skipping", Self::NAME);
            return Ok(());
        };
        let template = get.request();
        for removed in deleted {
            let request = AssembledRequest {
                path: removed.path,
                body: None,
                ..template.clone()
            };
            exec.execute(TestSpec {
                scenario: format!("{} [{}]", self.scenario(), request.path),
                request,
                expected: ResponseCodeFamily::ClientError,
                note: None,
            });
        }
        Ok(())
    }
}

/// Registered fuzzers of a run, in registration order per phase
#[derive(Default)]
pub struct FuzzerRegistry {
    phase_one: Vec<Box<dyn Fuzzer>>,
    phase_two: Vec<Box<dyn PathFuzzer>>,
}

impl FuzzerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in fuzzers whose predicate holds for `config`, narrowed by the name filters.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let filter = &config.filter;
        let known: Vec<&str> = BUILTIN
            .iter()
            .map(|d| d.name)
            .chain(std::iter::once(DeletedResourcesFuzzer::NAME))
            .collect();
        for name in filter.fuzzers.iter().chain(&filter.skip_fuzzers) {
            if !known.contains(&name.as_str()) {
                tracing::warn!("Unknown fuzzer in filter: {name}");
            }
        }
        let selected = |name: &str| {
            (filter.fuzzers.is_empty() || filter.fuzzers.iter().any(|f| f == name))
                && !filter.skip_fuzzers.iter().any(|f| f == name)
        };

        let mut registry = Self::new();
        for descriptor in BUILTIN {
            if (descriptor.enabled)(config) && selected(descriptor.name) {
                registry.register(Box::new(DescriptorFuzzer::new(*descriptor)));
            }
        }
        if selected(DeletedResourcesFuzzer::NAME) {
            registry.register_phase_two(Box::new(DeletedResourcesFuzzer));
        }
        tracing::debug!(
            "Registered {} phase-1 and {} phase-2 fuzzers",
            registry.phase_one.len(),
            registry.phase_two.len()
        );
        registry
    }

    pub fn register(&mut self, fuzzer: Box<dyn Fuzzer>) -> &mut Self {
        self.phase_one.push(fuzzer);
        self
    }

    pub fn register_phase_two(&mut self, fuzzer: Box<dyn PathFuzzer>) -> &mut Self {
        self.phase_two.push(fuzzer);
        self
    }

    #[must_use]
    pub fn phase_one(&self) -> &[Box<dyn Fuzzer>] {
        &self.phase_one
    }

    #[must_use]
    pub fn phase_two(&self) -> &[Box<dyn PathFuzzer>] {
        &self.phase_two
    }

    /// Phase-1 fuzzers whose skip set shares no method with `methods`.
    #[must_use]
    pub fn eligible_for(&self, methods: &[HttpMethod]) -> Vec<&dyn Fuzzer> {
        self.phase_one
            .iter()
            .filter(|f| !f.skip_methods().iter().any(|m| methods.contains(m)))
            .map(AsRef::as_ref)
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phase_one.is_empty() && self.phase_two.is_empty()
    }
}

/// Row of the `list` command
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FuzzerInfo {
    pub name: &'static str,
    pub phase: u8,
    pub scenario: &'static str,
    pub skip_methods: Vec<HttpMethod>,
}

/// Every built-in fuzzer, regardless of config.
#[must_use]
pub fn listing() -> Vec<FuzzerInfo> {
    BUILTIN
        .iter()
        .map(|d| FuzzerInfo {
            name: d.name,
            phase: 1,
            scenario: d.scenario,
            skip_methods: d.skip_methods.to_vec(),
        })
        .chain(std::iter::once(FuzzerInfo {
            name: DeletedResourcesFuzzer::NAME,
            phase: 2,
            scenario: DeletedResourcesFuzzer::SCENARIO,
            skip_methods: Vec::new(),
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractfuzz_core::FilterConfig;

    fn names(registry: &FuzzerRegistry) -> Vec<&str> {
        registry.phase_one().iter().map(|f| f.name()).collect()
    }

    #[test]
    fn default_config_registers_trim_validate_variants() {
        let registry = FuzzerRegistry::from_config(&Config::default());
        let n = names(&registry);
        assert_eq!(n[0], "EmptyBodyFuzzer");
        assert!(n.contains(&"OnlyControlCharsInHeadersTrimValidateFuzzer"));
        assert!(!n.contains(&"TrailingSpacesInFieldsValidateTrimFuzzer"));
        assert_eq!(registry.phase_two().len(), 1);
    }

    #[test]
    fn validate_trim_strategy_swaps_variants() {
        let config = Config {
            edge_spaces_strategy: EdgeSpacesStrategy::ValidateAndTrim,
            ..Config::default()
        };
        let registry = FuzzerRegistry::from_config(&config);
        let n = names(&registry);
        assert!(n.contains(&"TrailingSpacesInFieldsValidateTrimFuzzer"));
        assert!(!n.contains(&"TrailingSpacesInFieldsTrimValidateFuzzer"));
        assert!(!n.contains(&"OnlyInvisibleCharsInHeadersTrimValidateFuzzer"));
    }

    #[test]
    fn name_filters() {
        let config = Config {
            filter: FilterConfig {
                fuzzers: vec![
                    "EmptyBodyFuzzer".into(),
                    "OnlySpacesInHeadersFuzzer".into(),
                ],
                skip_fuzzers: vec!["EmptyBodyFuzzer".into()],
                ..FilterConfig::default()
            },
            ..Config::default()
        };
        let registry = FuzzerRegistry::from_config(&config);
        assert_eq!(names(&registry), vec!["OnlySpacesInHeadersFuzzer"]);
        assert!(registry.phase_two().is_empty());
    }

    #[test]
    fn registration_order_follows_table() {
        let registry = FuzzerRegistry::from_config(&Config::default());
        let n = names(&registry);
        let table: Vec<&str> = BUILTIN
            .iter()
            .map(|d| d.name)
            .filter(|name| n.contains(name))
            .collect();
        assert_eq!(n, table);
    }

    #[test]
    fn eligibility_excludes_on_any_shared_method() {
        let registry = FuzzerRegistry::from_config(&Config::default());
        let with_get = registry.eligible_for(&[HttpMethod::Post, HttpMethod::Get]);
        assert!(with_get.iter().all(|f| f.name() != "EmptyBodyFuzzer"));
        assert!(with_get.iter().any(|f| f.name() == "OnlySpacesInHeadersFuzzer"));
        let post_only = registry.eligible_for(&[HttpMethod::Post]);
        assert_eq!(post_only.len(), registry.phase_one().len());
    }

    #[test]
    fn listing_covers_both_phases() {
        let rows = listing();
        assert_eq!(rows.len(), BUILTIN.len() + 1);
        assert_eq!(rows.last().map(|r| r.phase), Some(2));
        let names: std::collections::HashSet<_> = rows.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), rows.len());
    }
}
