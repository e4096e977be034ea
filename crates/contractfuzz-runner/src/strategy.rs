//! Mutation strategies: lazy generators of substitute values
//!
//! A strategy looks at one [`MutationSite`] and yields candidates on demand.
//! Every candidate becomes exactly one test execution. Strategies never touch
//! the fuzz case; the scheduler applies each candidate to a fresh request.

use serde_json::Value;

use contractfuzz_core::overrides::value_to_text;
use contractfuzz_core::{
    BoundaryPoint, FieldKind, FieldSpec, MutationCandidate, MutationKind, MutationTarget,
    ProbeCategory, TrimOutcome, Validity,
};

use crate::datagen::MAX_STRING_LEN;
use crate::validation;

/// Where substitute values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSource {
    Catalog(ProbeCategory),
    Fixed(&'static [&'static str]),
}

impl ProbeSource {
    #[must_use]
    pub const fn values(self) -> &'static [&'static str] {
        match self {
            Self::Catalog(category) => category.values(),
            Self::Fixed(values) => values,
        }
    }
}

/// One mutable spot of a fuzz case
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSite {
    pub target: MutationTarget,
    /// Contract declaration of the target; `None` for the whole body
    pub field: Option<FieldSpec>,
    /// Value the case currently carries
    pub current: Option<Value>,
}

impl MutationSite {
    fn current_text(&self) -> String {
        self.current.as_ref().map(value_to_text).unwrap_or_default()
    }
}

/// Pluggable generator of candidate values
pub trait MutationStrategy: Send + Sync {
    fn kind(&self) -> MutationKind;

    /// Candidates for `site`, produced lazily in a fixed order.
    fn candidates<'a>(
        &'a self,
        site: &'a MutationSite,
    ) -> Box<dyn Iterator<Item = MutationCandidate> + 'a>;
}

/// Target fully substituted by each probe
#[derive(Debug, Clone, Copy)]
pub struct Replace {
    pub source: ProbeSource,
    pub validity: Validity,
}

impl MutationStrategy for Replace {
    fn kind(&self) -> MutationKind {
        MutationKind::Replace
    }

    fn candidates<'a>(
        &'a self,
        site: &'a MutationSite,
    ) -> Box<dyn Iterator<Item = MutationCandidate> + 'a> {
        Box::new(self.source.values().iter().map(move |probe| MutationCandidate {
            target: site.target.clone(),
            value: Value::String((*probe).to_string()),
            kind: MutationKind::Replace,
            validity: self.validity,
            trim: None,
        }))
    }
}

/// Probe appended to the existing content; replaces when there is none
#[derive(Debug, Clone, Copy)]
pub struct Trail {
    pub source: ProbeSource,
    pub validity: Validity,
}

impl MutationStrategy for Trail {
    fn kind(&self) -> MutationKind {
        MutationKind::Trail
    }

    fn candidates<'a>(
        &'a self,
        site: &'a MutationSite,
    ) -> Box<dyn Iterator<Item = MutationCandidate> + 'a> {
        let current = site.current_text();
        Box::new(self.source.values().iter().map(move |probe| MutationCandidate {
            target: site.target.clone(),
            value: Value::String(format!("{current}{probe}")),
            kind: if current.is_empty() {
                MutationKind::Replace
            } else {
                MutationKind::Trail
            },
            validity: self.validity,
            trim: None,
        }))
    }
}

/// How the probe is placed before trimming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePlacement {
    Replace,
    Trail,
}

/// Trim the probe category off the mutated value, then check the remainder
/// against the field's constraints.
///
/// Both steps collapse into one candidate whose validity reflects the check,
/// so the scenario gets a single verdict.
#[derive(Debug, Clone, Copy)]
pub struct TrimThenValidate {
    pub category: ProbeCategory,
    pub placement: EdgePlacement,
}

impl MutationStrategy for TrimThenValidate {
    fn kind(&self) -> MutationKind {
        MutationKind::TrimThenValidate
    }

    fn candidates<'a>(
        &'a self,
        site: &'a MutationSite,
    ) -> Box<dyn Iterator<Item = MutationCandidate> + 'a> {
        let current = match self.placement {
            EdgePlacement::Replace => String::new(),
            EdgePlacement::Trail => site.current_text(),
        };
        Box::new(self.category.values().iter().map(move |probe| {
            let mutated = format!("{current}{probe}");
            let intermediate = self.category.trim(&mutated);
            let satisfies_constraints = site
                .field
                .as_ref()
                .is_none_or(|f| validation::satisfies_after_trim(f, &intermediate));
            MutationCandidate {
                target: site.target.clone(),
                value: Value::String(mutated),
                kind: MutationKind::TrimThenValidate,
                validity: if satisfies_constraints {
                    Validity::Valid
                } else {
                    Validity::Invalid
                },
                trim: Some(TrimOutcome {
                    intermediate,
                    satisfies_constraints,
                }),
            }
        }))
    }
}

/// Declared constraint a boundary strategy reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
}

/// Values one below, exactly at and one above a declared boundary.
///
/// Validity of each value is decided by checking it against every constraint
/// of the field, not by its side of the boundary alone.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryFromConstraint {
    pub bound: Bound,
}

impl BoundaryFromConstraint {
    const POINTS: [BoundaryPoint; 3] = [BoundaryPoint::Below, BoundaryPoint::At, BoundaryPoint::Above];

    fn value(self, field: &FieldSpec, point: BoundaryPoint) -> Option<Value> {
        let c = &field.constraints;
        match self.bound {
            Bound::MinLength | Bound::MaxLength => {
                let limit = if self.bound == Bound::MinLength {
                    c.min_length?
                } else {
                    c.max_length?
                };
                let len = match point {
                    BoundaryPoint::Below => limit.checked_sub(1)?,
                    BoundaryPoint::At => limit,
                    BoundaryPoint::Above => limit.checked_add(1)?,
                };
                let len = usize::try_from(len).ok().filter(|l| *l <= MAX_STRING_LEN)?;
                Some(Value::String("a".repeat(len)))
            }
            Bound::Minimum => {
                let limit = c.minimum.or(c.exclusive_minimum)?;
                numeric_boundary(field.kind, limit, f64::ceil, point)
            }
            Bound::Maximum => {
                let limit = c.maximum.or(c.exclusive_maximum)?;
                numeric_boundary(field.kind, limit, f64::floor, point)
            }
        }
    }
}

/// `round` brings a fractional limit inside the range for integer fields.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn numeric_boundary(
    kind: FieldKind,
    limit: f64,
    round: fn(f64) -> f64,
    point: BoundaryPoint,
) -> Option<Value> {
    if !limit.is_finite() {
        return None;
    }
    if kind == FieldKind::Integer {
        if limit.abs() >= i64::MAX as f64 {
            return None;
        }
        let at = round(limit) as i64;
        let v = match point {
            BoundaryPoint::Below => at.checked_sub(1)?,
            BoundaryPoint::At => at,
            BoundaryPoint::Above => at.checked_add(1)?,
        };
        return Some(Value::from(v));
    }
    let step = (limit.abs() * 1e-6).max(0.01);
    let v = match point {
        BoundaryPoint::Below => limit - step,
        BoundaryPoint::At => limit,
        BoundaryPoint::Above => limit + step,
    };
    serde_json::Number::from_f64(v).map(Value::Number)
}

impl MutationStrategy for BoundaryFromConstraint {
    fn kind(&self) -> MutationKind {
        MutationKind::Boundary(BoundaryPoint::At)
    }

    fn candidates<'a>(
        &'a self,
        site: &'a MutationSite,
    ) -> Box<dyn Iterator<Item = MutationCandidate> + 'a> {
        let Some(field) = site.field.as_ref() else {
            return Box::new(std::iter::empty());
        };
        Box::new(Self::POINTS.into_iter().filter_map(move |point| {
            let value = self.value(field, point)?;
            let validity = if validation::satisfies(field, &value) {
                Validity::Valid
            } else {
                Validity::Invalid
            };
            Some(MutationCandidate {
                target: site.target.clone(),
                value,
                kind: MutationKind::Boundary(point),
                validity,
                trim: None,
            })
        }))
    }
}
