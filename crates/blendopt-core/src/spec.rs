//! Per-grade property specifications and their resolution into surrogate units.

use std::collections::BTreeMap;

use crate::property::Property;
use crate::units::to_surrogate;

/// Which side of a bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Side {
    Min,
    Max,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Min => "min",
            Side::Max => "max",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A min/max pair for one property of one grade.
///
/// A minimum of 0 or an infinite minimum means "no lower bound". A maximum of
/// 0 is a real bound; only an infinite maximum is unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Bound {
    #[cfg_attr(
        feature = "serde",
        serde(serialize_with = "unbounded::serialize", deserialize_with = "unbounded::min")
    )]
    pub min: f64,
    #[cfg_attr(
        feature = "serde",
        serde(serialize_with = "unbounded::serialize", deserialize_with = "unbounded::max")
    )]
    pub max: f64,
}

impl Default for Bound {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

impl Bound {
    pub const UNBOUNDED: Bound = Bound { min: 0.0, max: f64::INFINITY };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: f64) -> Self {
        Self { min, max: f64::INFINITY }
    }

    pub fn at_most(max: f64) -> Self {
        Self { min: 0.0, max }
    }

    /// The lower bound, if it constrains anything
    pub fn active_min(&self) -> Option<f64> {
        (self.min.is_finite() && self.min > 0.0).then_some(self.min)
    }

    /// The upper bound, if it constrains anything
    pub fn active_max(&self) -> Option<f64> {
        self.max.is_finite().then_some(self.max)
    }

    pub fn active(&self, side: Side) -> Option<f64> {
        match side {
            Side::Min => self.active_min(),
            Side::Max => self.active_max(),
        }
    }

    /// Forward-convert into the surrogate of `property`, leaving sentinels alone
    pub fn to_surrogate(self, property: Property) -> Self {
        let min = if self.min == 0.0 || self.min.is_infinite() {
            self.min
        } else {
            to_surrogate(property, self.min)
        };
        let max = if self.max.is_infinite() {
            self.max
        } else {
            to_surrogate(property, self.max)
        };
        Self { min, max }
    }
}

#[cfg(feature = "serde")]
pub(crate) mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn min<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
    }

    pub fn max<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// Raw specifications in external units, keyed by property then grade name.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SpecTable {
    bounds: BTreeMap<Property, BTreeMap<String, Bound>>,
}

impl SpecTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, property: Property, grade: impl Into<String>, bound: Bound) {
        self.bounds.entry(property).or_default().insert(grade.into(), bound);
    }

    pub fn with(mut self, property: Property, grade: impl Into<String>, bound: Bound) -> Self {
        self.set(property, grade, bound);
        self
    }

    /// The bound for a pair, `{0, inf}` when absent
    pub fn get(&self, property: Property, grade: &str) -> Bound {
        self.bounds
            .get(&property)
            .and_then(|grades| grades.get(grade))
            .copied()
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, &str, Bound)> + '_ {
        self.bounds.iter().flat_map(|(&property, grades)| {
            grades.iter().map(move |(grade, &bound)| (property, grade.as_str(), bound))
        })
    }

    pub fn len(&self) -> usize {
        self.bounds.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add surrogate bounds derived from each RON, MON and RVP bound.
    pub fn resolve(&self) -> ResolvedSpecs {
        let mut bounds = self.bounds.clone();
        for (property, grades) in &self.bounds {
            let Some(surrogate) = property.surrogate() else {
                continue;
            };
            let converted = grades
                .iter()
                .map(|(grade, bound)| (grade.clone(), bound.to_surrogate(*property)))
                .collect();
            bounds.insert(surrogate, converted);
        }
        ResolvedSpecs { bounds }
    }
}

/// Specifications with surrogate bounds filled in. Consumed by the model
/// builder and the violation checker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSpecs {
    bounds: BTreeMap<Property, BTreeMap<String, Bound>>,
}

impl ResolvedSpecs {
    pub fn get(&self, property: Property, grade: &str) -> Bound {
        self.bounds
            .get(&property)
            .and_then(|grades| grades.get(grade))
            .copied()
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, &str, Bound)> + '_ {
        self.bounds.iter().flat_map(|(&property, grades)| {
            grades.iter().map(move |(grade, &bound)| (property, grade.as_str(), bound))
        })
    }
}
