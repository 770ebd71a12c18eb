//! Solver backends and preference-driven selection.
//!
//! Every backend answers the same contract: `solve(problem) -> Solution`.
//! Callers name a preferred backend with [`SolverChoice`]; a preference that is
//! not compiled in resolves to the dense simplex, and the substitution is
//! recorded in [`SolverUsed`].

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::problem::LpProblem;
use crate::simplex::Solver;
use crate::solution::{Solution, SolutionStatus};

/// A linear programming backend.
pub trait LpBackend {
    /// Short, stable backend name used in reports.
    fn name(&self) -> &'static str;

    /// Solve the problem. Failures surface as a non-optimal status.
    fn solve(&self, problem: &LpProblem) -> Solution;
}

impl LpBackend for Solver {
    fn name(&self) -> &'static str {
        "simplex"
    }

    fn solve(&self, problem: &LpProblem) -> Solution {
        Solver::solve(self, problem)
    }
}

/// Backend preference supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SolverChoice {
    /// The built-in dense simplex
    #[default]
    Simplex,
    /// The `microlp` crate (requires the `microlp` feature)
    Microlp,
}

impl SolverChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            SolverChoice::Simplex => "simplex",
            SolverChoice::Microlp => "microlp",
        }
    }

    /// Whether this backend was compiled into the current build
    pub fn is_available(self) -> bool {
        match self {
            SolverChoice::Simplex => true,
            SolverChoice::Microlp => cfg!(feature = "microlp"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown solver: {0} (expected `simplex` or `microlp`)")]
pub struct UnknownSolver(pub String);

impl FromStr for SolverChoice {
    type Err = UnknownSolver;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simplex" | "default" => Ok(SolverChoice::Simplex),
            "microlp" => Ok(SolverChoice::Microlp),
            other => Err(UnknownSolver(other.to_string())),
        }
    }
}

/// Which backend actually produced the results of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverUsed {
    /// Backend that was asked for
    pub requested: SolverChoice,
    /// Name of the backend that ran
    pub backend: String,
    /// Why the requested backend was replaced, if it was
    pub fallback_reason: Option<String>,
}

impl fmt::Display for SolverUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fallback_reason {
            Some(reason) => write!(f, "{} ({})", self.backend, reason),
            None => write!(f, "{}", self.backend),
        }
    }
}

/// A selected backend plus the default simplex to fall back on.
///
/// One handle belongs to one optimization run; it is not shared across runs.
pub struct SolverHandle {
    requested: SolverChoice,
    preferred: Option<Box<dyn LpBackend + Send>>,
    default: Solver,
    unavailable: bool,
    fell_back: Cell<bool>,
}

impl SolverHandle {
    /// Resolve a preference to a backend, falling back to the simplex when the
    /// preferred backend is not compiled in.
    pub fn select(choice: SolverChoice) -> Self {
        Self::select_with(choice, Solver::new())
    }

    /// Like [`SolverHandle::select`], with a configured default simplex.
    pub fn select_with(choice: SolverChoice, default: Solver) -> Self {
        let preferred = preferred_backend(choice);
        let unavailable = choice != SolverChoice::Simplex && preferred.is_none();
        if unavailable {
            tracing::warn!(
                component = "solver",
                operation = "select",
                status = "fallback",
                requested = choice.as_str(),
                "{} is not available, using the simplex",
                choice.as_str()
            );
        }
        Self {
            requested: choice,
            preferred,
            default,
            unavailable,
            fell_back: Cell::new(false),
        }
    }

    /// Solve with the preferred backend. An `Error` status, or an optimum that
    /// breaks a constraint, is retried on the default simplex and the fallback
    /// is remembered.
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        let Some(preferred) = &self.preferred else {
            return self.default.solve(problem);
        };

        let solution = preferred.solve(problem);
        match solution.status {
            SolutionStatus::Error => {
                tracing::warn!(
                    component = "solver",
                    operation = "solve",
                    status = "fallback",
                    backend = preferred.name(),
                    "{} failed, retrying with the simplex",
                    preferred.name()
                );
            }
            SolutionStatus::Optimal => {
                let tolerance = self.default.feasibility_tolerance();
                let Some(constraint) = problem.first_violated(&solution.values, tolerance) else {
                    return solution;
                };
                tracing::warn!(
                    component = "solver",
                    operation = "solve",
                    status = "fallback",
                    backend = preferred.name(),
                    constraint,
                    "{} returned a point outside {}, retrying with the simplex",
                    preferred.name(),
                    constraint
                );
            }
            _ => return solution,
        }
        self.fell_back.set(true);
        self.default.solve(problem)
    }

    /// The backend that produced results so far
    pub fn used(&self) -> SolverUsed {
        let backend = match &self.preferred {
            Some(preferred) if !self.fell_back.get() => preferred.name(),
            _ => self.default.name(),
        };
        let fallback_reason = if self.unavailable {
            Some(format!("{} not available", self.requested.as_str()))
        } else if self.fell_back.get() {
            Some("fallback".to_string())
        } else {
            None
        };
        SolverUsed {
            requested: self.requested,
            backend: backend.to_string(),
            fallback_reason,
        }
    }
}

fn preferred_backend(choice: SolverChoice) -> Option<Box<dyn LpBackend + Send>> {
    match choice {
        SolverChoice::Simplex => None,
        #[cfg(feature = "microlp")]
        SolverChoice::Microlp => Some(Box::new(microlp_backend::MicrolpBackend)),
        #[cfg(not(feature = "microlp"))]
        SolverChoice::Microlp => None,
    }
}

#[cfg(feature = "microlp")]
mod microlp_backend {
    use microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

    use super::LpBackend;
    use crate::problem::{ConstraintOp, LpProblem};
    use crate::solution::{Analysis, Solution};

    /// Sparse revised simplex from the `microlp` crate. Provides no dual analysis.
    pub struct MicrolpBackend;

    impl LpBackend for MicrolpBackend {
        fn name(&self) -> &'static str {
            "microlp"
        }

        fn solve(&self, problem: &LpProblem) -> Solution {
            let direction = if problem.objective.minimize {
                OptimizationDirection::Minimize
            } else {
                OptimizationDirection::Maximize
            };
            let mut lp = Problem::new(direction);
            let vars: Vec<_> = (0..problem.num_variables())
                .map(|j| {
                    let coef = problem.objective.coefficients.get(j).copied().unwrap_or(0.0);
                    lp.add_var(coef, (0.0, f64::INFINITY))
                })
                .collect();

            for c in &problem.constraints {
                let mut expr = LinearExpr::empty();
                for (var, &coef) in vars.iter().zip(&c.coefficients) {
                    if coef != 0.0 {
                        expr.add(*var, coef);
                    }
                }
                let op = match c.op {
                    ConstraintOp::Le => ComparisonOp::Le,
                    ConstraintOp::Ge => ComparisonOp::Ge,
                    ConstraintOp::Eq => ComparisonOp::Eq,
                };
                lp.add_constraint(expr, op, c.rhs);
            }

            match lp.solve() {
                Ok(solution) => {
                    let values: Vec<f64> = vars.iter().map(|&v| solution[v].max(0.0)).collect();
                    let objective_value = problem.objective_value(&values);
                    Solution::optimal(values, objective_value, Analysis::default())
                }
                Err(microlp::Error::Infeasible) => Solution::infeasible(),
                Err(microlp::Error::Unbounded) => Solution::unbounded(),
                Err(_) => Solution::error(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintOp;

    struct FailingBackend;

    impl LpBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn solve(&self, _problem: &LpProblem) -> Solution {
            Solution::error()
        }
    }

    fn small_problem() -> LpProblem {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![2.0], false);
        problem.add_constraint("cap", vec![1.0], ConstraintOp::Le, 3.0);
        problem
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!("simplex".parse::<SolverChoice>().unwrap(), SolverChoice::Simplex);
        assert_eq!(" MicroLP ".parse::<SolverChoice>().unwrap(), SolverChoice::Microlp);
        let err = "glpk".parse::<SolverChoice>().unwrap_err();
        assert!(err.to_string().contains("glpk"));
    }

    #[test]
    fn test_default_selection_records_simplex() {
        let handle = SolverHandle::select(SolverChoice::Simplex);
        let solution = handle.solve(&small_problem());
        assert!(solution.is_optimal());
        assert!((solution.objective_value - 6.0).abs() < 1e-9);

        let used = handle.used();
        assert_eq!(used.backend, "simplex");
        assert_eq!(used.fallback_reason, None);
        assert_eq!(used.to_string(), "simplex");
    }

    #[cfg(not(feature = "microlp"))]
    #[test]
    fn test_unavailable_preference_falls_back() {
        let handle = SolverHandle::select(SolverChoice::Microlp);
        assert!(!SolverChoice::Microlp.is_available());

        let solution = handle.solve(&small_problem());
        assert!(solution.is_optimal());
        assert_eq!(handle.used().to_string(), "simplex (microlp not available)");
    }

    #[cfg(feature = "microlp")]
    #[test]
    fn test_microlp_backend_solves() {
        let handle = SolverHandle::select(SolverChoice::Microlp);
        let solution = handle.solve(&small_problem());
        assert!(solution.is_optimal());
        assert!((solution.values[0] - 3.0).abs() < 1e-9);
        assert_eq!(handle.used().to_string(), "microlp");
    }

    struct OriginBackend;

    impl LpBackend for OriginBackend {
        fn name(&self) -> &'static str {
            "origin"
        }

        fn solve(&self, problem: &LpProblem) -> Solution {
            Solution::optimal(vec![0.0; problem.num_variables()], 0.0, Default::default())
        }
    }

    fn handle_with(preferred: Box<dyn LpBackend + Send>, default: Solver) -> SolverHandle {
        SolverHandle {
            requested: SolverChoice::Microlp,
            preferred: Some(preferred),
            default,
            unavailable: false,
            fell_back: Cell::new(false),
        }
    }

    #[test]
    fn test_infeasible_optimum_retries_on_simplex() {
        let mut problem = small_problem();
        problem.add_constraint("floor", vec![1.0], ConstraintOp::Ge, 1.0);

        let handle = handle_with(Box::new(OriginBackend), Solver::new());
        let solution = handle.solve(&problem);
        assert!(solution.is_optimal());
        assert!((solution.values[0] - 3.0).abs() < 1e-9);
        assert_eq!(handle.used().to_string(), "simplex (fallback)");

        // the origin satisfies the plain cap, so that answer is kept
        let handle = handle_with(Box::new(OriginBackend), Solver::new());
        let solution = handle.solve(&small_problem());
        assert_eq!(solution.values, vec![0.0]);
        assert_eq!(handle.used().backend, "origin");
    }

    #[test]
    fn test_feasibility_tolerance_applies_to_preferred_answers() {
        let mut problem = small_problem();
        problem.add_constraint("floor", vec![1.0], ConstraintOp::Ge, 1e-4);

        let loose = Solver::new().with_feasibility_tolerance(1e-3);
        let handle = handle_with(Box::new(OriginBackend), loose);
        handle.solve(&problem);
        assert_eq!(handle.used().backend, "origin");

        let handle = handle_with(Box::new(OriginBackend), Solver::new());
        handle.solve(&problem);
        assert_eq!(handle.used().backend, "simplex");
    }

    #[test]
    fn test_error_status_retries_on_simplex() {
        let handle = SolverHandle {
            requested: SolverChoice::Microlp,
            preferred: Some(Box::new(FailingBackend)),
            default: Solver::new(),
            unavailable: false,
            fell_back: Cell::new(false),
        };
        assert_eq!(handle.used().backend, "failing");

        let solution = handle.solve(&small_problem());
        assert!(solution.is_optimal());
        assert_eq!(handle.used().to_string(), "simplex (fallback)");
    }
}
