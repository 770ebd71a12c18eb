//! Forward and inverse transforms between external quality metrics and their
//! linear blending surrogates.
//!
//! The octane pair is not exactly symmetric. The forward transform switches
//! branch at an octane of 85, where it steps down from 96.5 to
//! `exp(0.0135 * 85 + 3.42)` ≈ 96.303; the inverse switches at a surrogate of
//! 96.5. Octanes in 85..≈85.151 therefore map into 96.303..=96.5 and come back
//! through the linear branch, about 0.2 low. Each branch is strictly
//! increasing on its own.

use std::collections::BTreeMap;

use crate::property::{Property, PropertyValues};

const OCTANE_BRANCH: f64 = 85.0;
const OCTANE_INVERSE_BRANCH: f64 = 96.5;
const OCTANE_OFFSET: f64 = 11.5;
const OCTANE_SLOPE: f64 = 0.0135;
const OCTANE_INTERCEPT: f64 = 3.42;
const VAPOR_SCALE: f64 = 14.5;
const VAPOR_EXPONENT: f64 = 1.25;

/// RON or MON to its blending index.
pub fn octane_to_surrogate(octane: f64) -> f64 {
    if octane < OCTANE_BRANCH {
        octane + OCTANE_OFFSET
    } else {
        (OCTANE_SLOPE * octane + OCTANE_INTERCEPT).exp()
    }
}

/// Blending index back to RON or MON. A surrogate of exactly 96.5 takes the
/// linear branch.
pub fn surrogate_to_octane(surrogate: f64) -> f64 {
    if surrogate <= OCTANE_INVERSE_BRANCH {
        surrogate - OCTANE_OFFSET
    } else {
        (surrogate.ln() - OCTANE_INTERCEPT) / OCTANE_SLOPE
    }
}

/// RVP to its blending index.
pub fn vapor_pressure_to_surrogate(rvp: f64) -> f64 {
    (rvp * VAPOR_SCALE).powf(VAPOR_EXPONENT)
}

/// Blending index back to RVP.
pub fn surrogate_to_vapor_pressure(surrogate: f64) -> f64 {
    surrogate.powf(1.0 / VAPOR_EXPONENT) / VAPOR_SCALE
}

/// Convert an external value to the surrogate of `property`.
/// Properties without a surrogate pass through unchanged.
pub fn to_surrogate(property: Property, value: f64) -> f64 {
    match property {
        Property::Ron | Property::Mon => octane_to_surrogate(value),
        Property::Rvp => vapor_pressure_to_surrogate(value),
        _ => value,
    }
}

/// Convert a surrogate value back to external units.
/// Non-surrogate properties pass through unchanged.
pub fn from_surrogate(property: Property, value: f64) -> f64 {
    match property {
        Property::Roi | Property::Moi => surrogate_to_octane(value),
        Property::Rvi => surrogate_to_vapor_pressure(value),
        _ => value,
    }
}

/// Expand raw component values into a full value set, with surrogates
/// computed from their external counterparts. Missing inputs read as zero.
pub fn with_surrogates(raw: &BTreeMap<Property, f64>) -> PropertyValues {
    let mut values = PropertyValues::default();
    for property in Property::INPUTS {
        let value = raw.get(&property).copied().unwrap_or(0.0);
        values[property] = value;
        if let Some(surrogate) = property.surrogate() {
            values[surrogate] = to_surrogate(property, value);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_octane_branches() {
        assert!((octane_to_surrogate(80.0) - 91.5).abs() < 1e-12);
        assert!((octane_to_surrogate(95.0) - (0.0135f64 * 95.0 + 3.42).exp()).abs() < 1e-12);
        assert!((surrogate_to_octane(91.5) - 80.0).abs() < 1e-12);
    }

    #[test]
    fn test_octane_branch_points_are_pinned() {
        // x = 85 takes the exponential branch
        let at_85 = octane_to_surrogate(85.0);
        assert!((at_85 - (0.0135f64 * 85.0 + 3.42).exp()).abs() < 1e-12);
        assert!(at_85 < 96.5, "forward value at 85 is {}", at_85);
        // ... and steps down from the linear branch just below it
        assert!(octane_to_surrogate(84.999) > at_85);
        // its inverse lands on the linear branch, not back at 85
        let back = surrogate_to_octane(at_85);
        assert!((back - (at_85 - 11.5)).abs() < 1e-12);
        assert!((back - 84.803).abs() < 1e-3, "85 came back as {}", back);

        // y = 96.5 takes the linear branch
        assert!((surrogate_to_octane(96.5) - 85.0).abs() < 1e-12);
        // just above it, the logarithmic branch
        let above = surrogate_to_octane(96.5 + 1e-9);
        assert!((above - (((96.5f64 + 1e-9).ln() - 3.42) / 0.0135)).abs() < 1e-9);
    }

    #[test]
    fn test_octane_round_trip_away_from_branch() {
        for x in [60.0, 70.0, 84.0, 85.2, 86.0, 91.0, 95.0, 100.0, 110.0, 128.0] {
            let back = surrogate_to_octane(octane_to_surrogate(x));
            assert!((back - x).abs() < 1e-9, "{} came back as {}", x, back);
        }
    }

    #[test]
    fn test_vapor_pressure_known_value() {
        // (0.7 * 14.5)^1.25
        assert!((vapor_pressure_to_surrogate(0.7) - 10.15f64.powf(1.25)).abs() < 1e-12);
    }

    #[test]
    fn test_with_surrogates_fills_indices() {
        let raw = BTreeMap::from([
            (Property::Ron, 97.0),
            (Property::Mon, 80.0),
            (Property::Rvp, 0.5),
            (Property::Aro, 30.0),
        ]);
        let values = with_surrogates(&raw);
        assert_eq!(values[Property::Ron], 97.0);
        assert_eq!(values[Property::Roi], octane_to_surrogate(97.0));
        assert_eq!(values[Property::Moi], 91.5);
        assert_eq!(values[Property::Rvi], vapor_pressure_to_surrogate(0.5));
        assert_eq!(values[Property::Aro], 30.0);
        assert_eq!(values[Property::Ben], 0.0);
    }

    #[test]
    fn test_pass_through_for_linear_properties() {
        assert_eq!(to_surrogate(Property::Sul, 10.0), 10.0);
        assert_eq!(from_surrogate(Property::Sul, 10.0), 10.0);
        assert_eq!(from_surrogate(Property::Roi, 91.5), 80.0);
    }

    proptest! {
        #[test]
        fn proptest_vapor_pressure_round_trip(x in 1e-4f64..50.0f64) {
            let back = surrogate_to_vapor_pressure(vapor_pressure_to_surrogate(x));
            prop_assert!((back - x).abs() <= 1e-9 * x.max(1.0), "{} -> {}", x, back);
        }

        #[test]
        fn proptest_octane_surrogate_increasing_below_branch(x in 0.0f64..84.0f64, dx in 1e-3f64..1.0f64) {
            prop_assert!(octane_to_surrogate(x + dx) > octane_to_surrogate(x));
        }

        #[test]
        fn proptest_octane_surrogate_increasing_above_branch(x in 85.0f64..150.0f64, dx in 1e-3f64..20.0f64) {
            prop_assert!(octane_to_surrogate(x + dx) > octane_to_surrogate(x));
        }

        #[test]
        fn proptest_blend_average_monotone_in_component_octane(
            a in 85.0f64..120.0f64,
            b in 60.0f64..120.0f64,
            bump in 0.01f64..10.0f64,
            share in 0.01f64..0.99f64,
        ) {
            let avg = |first: f64| share * octane_to_surrogate(first) + (1.0 - share) * octane_to_surrogate(b);
            prop_assert!(avg(a + bump) >= avg(a));
        }
    }
}
