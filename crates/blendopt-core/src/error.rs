use thiserror::Error;

/// Malformed optimization input. Reported before any model is built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("No components found for optimization")]
    NoComponents,
    #[error("No grades found for optimization")]
    NoGrades,
    #[error("Duplicate component: {0}")]
    DuplicateComponent(String),
    #[error("Duplicate grade: {0}")]
    DuplicateGrade(String),
    #[error("Unknown property: {0}")]
    UnknownProperty(String),
    #[error("Unknown grade in specifications: {0}")]
    UnknownGrade(String),
    #[error("Invalid value for {field} of {owner}: {value}")]
    InvalidNumber { owner: String, field: &'static str, value: f64 },
    #[error("Grade {0}: minimum volume exceeds maximum volume")]
    GradeVolumeRange(String),
    #[error("Component {0}: minimum usage exceeds availability")]
    MinUsageExceedsAvailability(String),
    #[error("{owner}: {property} is derived from its external property and cannot be supplied")]
    DerivedProperty { owner: String, property: String },
    #[error("Specification {property} for {grade}: minimum {min} exceeds maximum {max}")]
    SpecRange { property: String, grade: String, min: f64, max: f64 },
    #[error("Property list must not contain {0}; list the external property instead")]
    SurrogateInPropertyList(String),
}

/// A model could not be constructed from otherwise valid input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Grade index {0} is out of range")]
    UnknownGrade(usize),
    #[error("Penalty for {property} must be finite and non-negative, got {penalty}")]
    InvalidPenalty { property: String, penalty: f64 },
    #[error("Non-finite coefficient in {0}")]
    NonFinite(String),
}
