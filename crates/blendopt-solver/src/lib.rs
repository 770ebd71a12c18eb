mod backend;
mod problem;
mod simplex;
mod solution;

pub use backend::{LpBackend, SolverChoice, SolverHandle, SolverUsed, UnknownSolver};
pub use problem::{Constraint, ConstraintOp, LpProblem, Objective};
pub use simplex::Solver;
pub use solution::{Analysis, ReducedCost, ShadowPrice, Solution, SolutionStatus};
