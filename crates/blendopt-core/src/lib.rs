pub mod config;
pub mod diagnose;
pub mod error;
pub mod model;
pub mod optimize;
pub mod property;
pub mod request;
pub mod sample;
pub mod spec;
pub mod units;
pub mod violation;

pub use config::BlendPolicy;
pub use diagnose::{BestEffort, CriticalBound, Diagnosis, Diagnostician, RelaxMethod, Stage};
pub use error::{InputError, ModelError};
pub use model::{ActiveBound, BlendModel, BuildMode, ModelBuilder, Slack};
pub use optimize::{BlendReport, ComponentUsage, GradeBlend, GradeOutcome, GradeReport, optimize};
pub use property::{Property, PropertyValues};
pub use request::{BlendRequest, Component, Grade, Prepared};
pub use spec::{Bound, ResolvedSpecs, Side, SpecTable};
pub use violation::{Violation, blend_quality, check_violations};

pub use blendopt_solver::{SolutionStatus, SolverChoice, SolverUsed};
