//! Reconciles a candidate blend against a grade's specifications.

use std::collections::BTreeMap;

use crate::config::BlendPolicy;
use crate::property::{Property, PropertyValues};
use crate::spec::{ResolvedSpecs, Side};
use crate::units::from_surrogate;

/// A specification breached by a blend, reported in external units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Violation {
    /// External property name (RON rather than ROI)
    pub property: Property,
    pub side: Side,
    pub required: f64,
    pub achieved: f64,
    /// How far past the bound, always positive
    pub magnitude: f64,
    /// Whether the checked property is in the hard set
    pub hard: bool,
}

/// Volume-weighted average of `property` over a blend, `None` for an empty blend.
pub fn blend_average(blend: &[f64], values: &[PropertyValues], property: Property) -> Option<f64> {
    let total: f64 = blend.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let weighted: f64 = blend
        .iter()
        .zip(values)
        .map(|(quantity, v)| quantity * v[property])
        .sum();
    Some(weighted / total)
}

/// Achieved value of every linearly blended property, keyed by the name
/// shown to people. Surrogate averages are converted back, so RON, MON and RVP
/// appear here without ever being averaged themselves.
pub fn blend_quality(blend: &[f64], values: &[PropertyValues], properties: &[Property]) -> BTreeMap<Property, f64> {
    properties
        .iter()
        .filter(|p| !p.is_nonlinear_external())
        .filter_map(|&p| blend_average(blend, values, p).map(|avg| (p.display(), from_surrogate(p, avg))))
        .collect()
}

/// Compare a blend with `grade`'s resolved bounds.
///
/// Raw RON, MON and RVP are skipped; their surrogates are checked and
/// converted back together with their bounds. At most one violation is kept
/// per property: when both sides are breached the max overwrites the min.
pub fn check_violations(
    blend: &[f64],
    values: &[PropertyValues],
    specs: &ResolvedSpecs,
    grade: &str,
    properties: &[Property],
    policy: &BlendPolicy,
) -> BTreeMap<Property, Violation> {
    let mut violations = BTreeMap::new();
    let tolerance = policy.tolerance;

    for &property in properties {
        if property.is_nonlinear_external() {
            continue;
        }
        let Some(average) = blend_average(blend, values, property) else {
            return violations;
        };
        let bound = specs.get(property, grade);
        let achieved = from_surrogate(property, average);
        let display = property.display();
        let hard = policy.is_hard(property);

        if let Some(min) = bound.active_min() {
            let required = from_surrogate(property, min);
            if achieved < required - tolerance {
                violations.insert(
                    display,
                    Violation {
                        property: display,
                        side: Side::Min,
                        required,
                        achieved,
                        magnitude: required - achieved,
                        hard,
                    },
                );
            }
        }
        if let Some(max) = bound.active_max() {
            let required = from_surrogate(property, max);
            if achieved > required + tolerance {
                violations.insert(
                    display,
                    Violation {
                        property: display,
                        side: Side::Max,
                        required,
                        achieved,
                        magnitude: achieved - required,
                        hard,
                    },
                );
            }
        }
    }

    violations
}
