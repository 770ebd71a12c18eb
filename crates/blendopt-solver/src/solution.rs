/// The result of solving an LP problem
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable (empty unless optimal)
    pub values: Vec<f64>,
    /// Optimal objective value
    pub objective_value: f64,
    /// Dual information, empty unless the backend provides it
    pub analysis: Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// Solver encountered an error or gave up
    Error,
}

impl SolutionStatus {
    pub fn is_optimal(self) -> bool {
        matches!(self, SolutionStatus::Optimal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SolutionStatus::Optimal => "optimal",
            SolutionStatus::Infeasible => "infeasible",
            SolutionStatus::Unbounded => "unbounded",
            SolutionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sensitivity information read off the final simplex tableau
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Analysis {
    /// Shadow prices (dual values) for each constraint
    /// Indicates how much the objective would change per unit increase of the RHS
    pub shadow_prices: Vec<ShadowPrice>,

    /// Reduced costs for each variable
    /// For non-basic variables, indicates how much the objective coefficient
    /// must improve before the variable enters the solution
    pub reduced_costs: Vec<ReducedCost>,

    /// Which constraints are binding (tight) at optimum
    pub binding_constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShadowPrice {
    /// Constraint name
    pub constraint: String,
    /// Shadow price value
    pub value: f64,
    /// Interpretation
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReducedCost {
    /// Variable name
    pub variable: String,
    /// Current value in solution
    pub value: f64,
    /// Reduced cost
    pub reduced_cost: f64,
    /// Is this variable in the basis?
    pub is_basic: bool,
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64, analysis: Analysis) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            analysis,
        }
    }

    pub fn infeasible() -> Self {
        Self::without_values(SolutionStatus::Infeasible, f64::NAN)
    }

    pub fn unbounded() -> Self {
        Self::without_values(SolutionStatus::Unbounded, f64::NAN)
    }

    pub fn error() -> Self {
        Self::without_values(SolutionStatus::Error, f64::NAN)
    }

    fn without_values(status: SolutionStatus, objective_value: f64) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value,
            analysis: Analysis::default(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    /// Objective value, present only for optimal solutions
    pub fn objective(&self) -> Option<f64> {
        self.is_optimal().then_some(self.objective_value)
    }

    /// Value of a variable by column, zero when the solution carries no values
    pub fn value(&self, column: usize) -> f64 {
        self.values.get(column).copied().unwrap_or(0.0)
    }
}
