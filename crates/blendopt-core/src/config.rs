use std::collections::{BTreeMap, BTreeSet};

use crate::property::Property;

/// Relaxation and checking policy for one optimization run.
///
/// Properties in the hard set are never relaxed by selective relaxation.
/// Every other property is soft and, when relaxed, pays its penalty per unit
/// of slack.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlendPolicy {
    /// Regulatory properties, checked by their internal name
    pub hard: BTreeSet<Property>,
    /// Per-property penalty weights for soft bounds
    pub penalties: BTreeMap<Property, f64>,
    /// Penalty for soft properties without an explicit weight
    pub default_penalty: f64,
    /// Uniform penalty used by full relaxation
    pub full_relax_penalty: f64,
    /// Absolute tolerance for reporting violations and for accepting a
    /// backend's answer as feasible
    pub tolerance: f64,
    /// Run leave-one-out isolation when selective relaxation fails
    pub isolate_critical: bool,
}

impl Default for BlendPolicy {
    fn default() -> Self {
        Self {
            hard: BTreeSet::from([
                Property::Ben,
                Property::Sul,
                Property::Ron,
                Property::Roi,
                Property::Mon,
                Property::Moi,
                Property::Rvp,
                Property::Rvi,
                Property::Oxy,
                Property::E10,
            ]),
            penalties: BTreeMap::from([
                (Property::Olefin, 100.0),
                (Property::Aro, 20000.0),
                (Property::Spg, 300.0),
                (Property::E70, 1_500_000.0),
                (Property::E15, 15000.0),
                (Property::Eth, 250.0),
            ]),
            default_penalty: 1000.0,
            full_relax_penalty: 1000.0,
            tolerance: 1e-6,
            isolate_critical: true,
        }
    }
}

impl BlendPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy with no hard properties at all
    pub fn all_soft() -> Self {
        Self {
            hard: BTreeSet::new(),
            ..Self::default()
        }
    }

    /// Make a property hard. RON/ROI, MON/MOI and RVP/RVI move together.
    pub fn with_hard(mut self, property: Property) -> Self {
        for p in linked(property) {
            self.hard.insert(p);
        }
        self
    }

    /// Make a property soft with the given penalty weight
    pub fn with_soft(mut self, property: Property, penalty: f64) -> Self {
        for p in linked(property) {
            self.hard.remove(&p);
            self.penalties.insert(p, penalty);
        }
        self
    }

    pub fn with_default_penalty(mut self, penalty: f64) -> Self {
        self.default_penalty = penalty;
        self
    }

    pub fn with_full_relax_penalty(mut self, penalty: f64) -> Self {
        self.full_relax_penalty = penalty;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_isolate_critical(mut self, enabled: bool) -> Self {
        self.isolate_critical = enabled;
        self
    }

    pub fn is_hard(&self, property: Property) -> bool {
        self.hard.contains(&property)
    }

    pub fn penalty_for(&self, property: Property) -> f64 {
        self.penalties.get(&property).copied().unwrap_or(self.default_penalty)
    }
}

fn linked(property: Property) -> impl Iterator<Item = Property> {
    std::iter::once(property).chain(property.surrogate().or(property.external()))
}
