//! Optimization input: grades, components, specifications.

use std::collections::{BTreeMap, BTreeSet};

use blendopt_solver::SolverChoice;

use crate::error::InputError;
use crate::property::{Property, PropertyValues};
use crate::spec::{ResolvedSpecs, SpecTable};
use crate::units::with_surrogates;

/// A finished product.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Grade {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_volume: f64,
    #[cfg_attr(
        feature = "serde",
        serde(
            default = "unbounded",
            serialize_with = "crate::spec::unbounded::serialize",
            deserialize_with = "crate::spec::unbounded::max"
        )
    )]
    pub max_volume: f64,
    pub price: f64,
}

impl Grade {
    pub fn new(name: impl Into<String>, min_volume: f64, max_volume: f64, price: f64) -> Self {
        Self {
            name: name.into(),
            min_volume,
            max_volume,
            price,
        }
    }
}

/// A blending stock.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Component {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_name: String,
    pub cost: f64,
    pub availability: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_usage: f64,
    /// Raw values in external units. Missing properties read as zero.
    #[cfg_attr(feature = "serde", serde(default))]
    pub properties: BTreeMap<Property, f64>,
}

impl Component {
    pub fn new(name: impl Into<String>, cost: f64, availability: f64) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            cost,
            availability,
            min_usage: 0.0,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_min_usage(mut self, min_usage: f64) -> Self {
        self.min_usage = min_usage;
        self
    }

    pub fn with_property(mut self, property: Property, value: f64) -> Self {
        self.properties.insert(property, value);
        self
    }

    /// Name shown to people, falling back to the id
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// All sixteen values, surrogates included
    pub fn values(&self) -> PropertyValues {
        with_surrogates(&self.properties)
    }
}

/// Everything one optimization run needs besides its policy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendRequest {
    pub grades: Vec<Grade>,
    pub components: Vec<Component>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub specs: SpecTable,
    /// External properties in scope; surrogates follow their external
    #[cfg_attr(feature = "serde", serde(default = "default_properties"))]
    pub properties: Vec<Property>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub solver: SolverChoice,
}

#[cfg(feature = "serde")]
fn unbounded() -> f64 {
    f64::INFINITY
}

#[cfg(feature = "serde")]
fn default_properties() -> Vec<Property> {
    Property::INPUTS.to_vec()
}

impl BlendRequest {
    pub fn new(grades: Vec<Grade>, components: Vec<Component>, specs: SpecTable) -> Self {
        Self {
            grades,
            components,
            specs,
            properties: Property::INPUTS.to_vec(),
            solver: SolverChoice::default(),
        }
    }

    pub fn with_solver(mut self, solver: SolverChoice) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_properties(mut self, properties: Vec<Property>) -> Self {
        self.properties = properties;
        self
    }

    /// Check the request and derive everything the model needs from it.
    pub fn prepare(&self) -> Result<Prepared, InputError> {
        if self.components.is_empty() {
            return Err(InputError::NoComponents);
        }
        if self.grades.is_empty() {
            return Err(InputError::NoGrades);
        }

        let mut grade_names = BTreeSet::new();
        for grade in &self.grades {
            if !grade_names.insert(grade.name.as_str()) {
                return Err(InputError::DuplicateGrade(grade.name.clone()));
            }
            validate_grade(grade)?;
        }

        let mut component_names = BTreeSet::new();
        let mut values = Vec::with_capacity(self.components.len());
        for component in &self.components {
            if !component_names.insert(component.name.as_str()) {
                return Err(InputError::DuplicateComponent(component.name.clone()));
            }
            validate_component(component)?;
            let derived = component.values();
            if let Some((property, value)) = derived.iter().find(|(_, v)| !v.is_finite()) {
                return Err(InputError::InvalidNumber {
                    owner: component.name.clone(),
                    field: property.name(),
                    value,
                });
            }
            values.push(derived);
        }

        for (property, grade, bound) in self.specs.iter() {
            let owner = format!("{} for {}", property, grade);
            if property.is_surrogate() {
                return Err(InputError::DerivedProperty {
                    owner,
                    property: property.name().to_string(),
                });
            }
            if !grade_names.contains(grade) {
                return Err(InputError::UnknownGrade(grade.to_string()));
            }
            check_bound_number(&owner, "min", bound.min)?;
            check_bound_number(&owner, "max", bound.max)?;
            if bound.min.is_finite() && bound.max.is_finite() && bound.min > bound.max {
                return Err(InputError::SpecRange {
                    property: property.name().to_string(),
                    grade: grade.to_string(),
                    min: bound.min,
                    max: bound.max,
                });
            }
        }

        let specs = self.specs.resolve();
        if let Some((property, grade, bound)) = specs
            .iter()
            .find(|(_, _, b)| b.min.is_nan() || b.max.is_nan())
        {
            let (field, value) = if bound.min.is_nan() {
                ("min", self.specs.get(external(property), grade).min)
            } else {
                ("max", self.specs.get(external(property), grade).max)
            };
            return Err(InputError::InvalidNumber {
                owner: format!("{} for {}", external(property), grade),
                field,
                value,
            });
        }

        Ok(Prepared {
            values,
            specs,
            properties: model_properties(&self.properties)?,
        })
    }
}

/// A validated request, ready for model building.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Property values per component, in input order
    pub values: Vec<PropertyValues>,
    pub specs: ResolvedSpecs,
    /// Linearly blendable properties in scope, canonical order
    pub properties: Vec<Property>,
}

fn external(property: Property) -> Property {
    property.external().unwrap_or(property)
}

/// Expand external properties to the ones the model averages: RON, MON and
/// RVP are replaced by their surrogates.
fn model_properties(requested: &[Property]) -> Result<Vec<Property>, InputError> {
    let mut scope = BTreeSet::new();
    for &property in requested {
        if property.is_surrogate() {
            return Err(InputError::SurrogateInPropertyList(property.name().to_string()));
        }
        scope.insert(property.surrogate().unwrap_or(property));
    }
    Ok(Property::ALL.into_iter().filter(|p| scope.contains(p)).collect())
}

fn validate_grade(grade: &Grade) -> Result<(), InputError> {
    let invalid = |field, value| InputError::InvalidNumber {
        owner: grade.name.clone(),
        field,
        value,
    };
    if !grade.min_volume.is_finite() || grade.min_volume < 0.0 {
        return Err(invalid("min_volume", grade.min_volume));
    }
    if grade.max_volume.is_nan() || grade.max_volume == f64::NEG_INFINITY {
        return Err(invalid("max_volume", grade.max_volume));
    }
    if !grade.price.is_finite() {
        return Err(invalid("price", grade.price));
    }
    if grade.min_volume > grade.max_volume {
        return Err(InputError::GradeVolumeRange(grade.name.clone()));
    }
    Ok(())
}

fn validate_component(component: &Component) -> Result<(), InputError> {
    let invalid = |field, value| InputError::InvalidNumber {
        owner: component.name.clone(),
        field,
        value,
    };
    if !component.cost.is_finite() {
        return Err(invalid("cost", component.cost));
    }
    if !component.availability.is_finite() || component.availability < 0.0 {
        return Err(invalid("availability", component.availability));
    }
    if !component.min_usage.is_finite() || component.min_usage < 0.0 {
        return Err(invalid("min_usage", component.min_usage));
    }
    if component.min_usage > component.availability {
        return Err(InputError::MinUsageExceedsAvailability(component.name.clone()));
    }
    for (&property, &value) in &component.properties {
        if property.is_surrogate() {
            return Err(InputError::DerivedProperty {
                owner: component.name.clone(),
                property: property.name().to_string(),
            });
        }
        if !value.is_finite() {
            return Err(invalid(property.name(), value));
        }
    }
    Ok(())
}

fn check_bound_number(owner: &str, field: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_nan() {
        return Err(InputError::InvalidNumber {
            owner: owner.to_string(),
            field,
            value,
        });
    }
    Ok(())
}
