//! The closed set of quality properties tracked for every component and grade.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::error::InputError;

/// A blend quality property.
///
/// RON, MON and RVP do not blend linearly by volume. Each has a surrogate
/// (ROI, MOI, RVI) that does, and only surrogates are ever averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Property {
    /// Specific gravity
    Spg,
    /// Sulfur
    Sul,
    /// Research octane number
    Ron,
    /// Research octane blending index
    Roi,
    /// Motor octane number
    Mon,
    /// Motor octane blending index
    Moi,
    /// Reid vapor pressure
    Rvp,
    /// Vapor pressure blending index
    Rvi,
    /// Percent evaporated at 70 C
    E70,
    /// Percent evaporated at 100 C
    E10,
    /// Percent evaporated at 150 C
    E15,
    /// Aromatics
    Aro,
    /// Benzene
    Ben,
    /// Oxygen
    Oxy,
    /// Olefins
    Olefin,
    /// Ethanol
    Eth,
}

impl Property {
    pub const COUNT: usize = 16;

    /// Canonical order. Diagnosis and reporting walk properties in this order.
    pub const ALL: [Property; Property::COUNT] = [
        Property::Spg,
        Property::Sul,
        Property::Ron,
        Property::Roi,
        Property::Mon,
        Property::Moi,
        Property::Rvp,
        Property::Rvi,
        Property::E70,
        Property::E10,
        Property::E15,
        Property::Aro,
        Property::Ben,
        Property::Oxy,
        Property::Olefin,
        Property::Eth,
    ];

    /// Properties supplied by callers; surrogates are always derived.
    pub const INPUTS: [Property; 13] = [
        Property::Spg,
        Property::Sul,
        Property::Ron,
        Property::Mon,
        Property::Rvp,
        Property::E70,
        Property::E10,
        Property::E15,
        Property::Aro,
        Property::Ben,
        Property::Oxy,
        Property::Olefin,
        Property::Eth,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::Spg => "SPG",
            Property::Sul => "SUL",
            Property::Ron => "RON",
            Property::Roi => "ROI",
            Property::Mon => "MON",
            Property::Moi => "MOI",
            Property::Rvp => "RVP",
            Property::Rvi => "RVI",
            Property::E70 => "E70",
            Property::E10 => "E10",
            Property::E15 => "E15",
            Property::Aro => "ARO",
            Property::Ben => "BEN",
            Property::Oxy => "OXY",
            Property::Olefin => "OLEFIN",
            Property::Eth => "ETH",
        }
    }

    /// The linear surrogate of a nonlinear external property
    pub fn surrogate(self) -> Option<Property> {
        match self {
            Property::Ron => Some(Property::Roi),
            Property::Mon => Some(Property::Moi),
            Property::Rvp => Some(Property::Rvi),
            _ => None,
        }
    }

    /// The external property a surrogate stands in for
    pub fn external(self) -> Option<Property> {
        match self {
            Property::Roi => Some(Property::Ron),
            Property::Moi => Some(Property::Mon),
            Property::Rvi => Some(Property::Rvp),
            _ => None,
        }
    }

    pub fn is_surrogate(self) -> bool {
        self.external().is_some()
    }

    /// RON, MON and RVP: never averaged, never constrained directly
    pub fn is_nonlinear_external(self) -> bool {
        self.surrogate().is_some()
    }

    /// Name under which this property is reported to people
    pub fn display(self) -> Property {
        self.external().unwrap_or(self)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Property {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Property::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| InputError::UnknownProperty(s.to_string()))
    }
}

/// One value per property, indexed by [`Property`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyValues([f64; Property::COUNT]);

impl Default for PropertyValues {
    fn default() -> Self {
        Self([0.0; Property::COUNT])
    }
}

impl PropertyValues {
    pub fn iter(&self) -> impl Iterator<Item = (Property, f64)> + '_ {
        Property::ALL.into_iter().map(move |p| (p, self.0[p.index()]))
    }
}

impl Index<Property> for PropertyValues {
    type Output = f64;

    fn index(&self, property: Property) -> &f64 {
        &self.0[property.index()]
    }
}

impl IndexMut<Property> for PropertyValues {
    fn index_mut(&mut self, property: Property) -> &mut f64 {
        &mut self.0[property.index()]
    }
}
