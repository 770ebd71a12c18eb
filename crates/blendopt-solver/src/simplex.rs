use crate::problem::{ConstraintOp, LpProblem};
use crate::solution::{Analysis, ReducedCost, ShadowPrice, Solution};

/// Dense two-phase simplex solver for linear programming problems
#[derive(Debug, Clone)]
pub struct Solver {
    /// Maximum pivots per phase before giving up
    max_iterations: usize,
    /// Tolerance for pivot elements and reduced costs
    tolerance: f64,
    /// Largest artificial value accepted as feasible after phase 1
    feasibility_tolerance: f64,
    /// Consecutive degenerate pivots before switching to Bland's rule
    bland_after: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-6,
            bland_after: 50,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Also used to check answers from other backends
    pub fn with_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.feasibility_tolerance = tol;
        self
    }

    pub fn feasibility_tolerance(&self) -> f64 {
        self.feasibility_tolerance
    }

    /// Solve the LP problem using the two-phase simplex method.
    ///
    /// Infeasible problems are reported as such; no relaxation is attempted here.
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        let mut tableau = self.build_tableau(problem);

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau) {
                PhaseOne::Feasible => {}
                PhaseOne::Infeasible => return Solution::infeasible(),
                PhaseOne::IterationLimit => {
                    tracing::warn!(
                        component = "simplex",
                        operation = "phase1",
                        status = "iteration_limit",
                        max_iterations = self.max_iterations,
                        "phase 1 did not converge"
                    );
                    return Solution::error();
                }
            }
        }

        // Phase 2: Optimize
        let art_start = tableau.n_vars + tableau.n_slack;
        match self.iterate(&mut tableau, art_start) {
            SimplexResult::Optimal => {}
            SimplexResult::Unbounded => return Solution::unbounded(),
            SimplexResult::IterationLimit => {
                tracing::warn!(
                    component = "simplex",
                    operation = "phase2",
                    status = "iteration_limit",
                    max_iterations = self.max_iterations,
                    "phase 2 did not converge"
                );
                return Solution::error();
            }
        }

        self.extract_solution(&tableau, problem)
    }

    fn build_tableau(&self, problem: &LpProblem) -> Tableau {
        let n_vars = problem.num_variables();
        let n_constraints = problem.num_constraints();

        // Normalize every row to a non-negative RHS first
        let normalized: Vec<(ConstraintOp, f64)> = problem
            .constraints
            .iter()
            .map(|c| if c.rhs < 0.0 { (c.op.flipped(), -1.0) } else { (c.op, 1.0) })
            .collect();

        let mut n_slack = 0;
        let mut n_artificial = 0;
        for (op, _) in &normalized {
            match op {
                ConstraintOp::Le => n_slack += 1,
                ConstraintOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                ConstraintOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            rows: Vec::with_capacity(n_constraints),
            n_vars,
            n_slack,
            n_artificial,
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (c, &(op, orientation))) in problem.constraints.iter().zip(&normalized).enumerate() {
            for (j, &coef) in c.coefficients.iter().enumerate().take(n_vars) {
                tableau.data[i][j] = orientation * coef;
            }
            tableau.data[i][total_cols - 1] = orientation * c.rhs;

            let row = match op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                    RowInfo { dual_col: slack_idx - 1, dual_sign: -1.0, orientation }
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    slack_idx += 1;
                    artificial_idx += 1;
                    RowInfo { dual_col: slack_idx - 1, dual_sign: 1.0, orientation }
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                    RowInfo { dual_col: artificial_idx - 1, dual_sign: -1.0, orientation }
                }
            };
            tableau.rows.push(row);
        }

        // Objective row (last row) holds reduced costs of a maximization;
        // minimization is handled by negating the coefficients
        let obj_row = n_constraints;
        for (j, &coef) in problem.objective.coefficients.iter().enumerate().take(n_vars) {
            tableau.data[obj_row][j] = if problem.objective.minimize { -coef } else { coef };
        }

        tableau
    }

    fn phase1(&self, tableau: &mut Tableau) -> PhaseOne {
        let n_constraints = tableau.basic_vars.len();
        let n_cols = tableau.width();
        let rhs_col = n_cols - 1;
        let art_start = tableau.n_vars + tableau.n_slack;

        // Maximize -sum(artificials), keeping the real objective aside
        let original = std::mem::replace(&mut tableau.data[n_constraints], vec![0.0; n_cols]);
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] += tableau.data[i][j];
                }
            }
        }

        match self.iterate(tableau, art_start) {
            SimplexResult::Optimal => {}
            // The phase 1 objective is bounded by zero
            SimplexResult::Unbounded => return PhaseOne::Infeasible,
            SimplexResult::IterationLimit => return PhaseOne::IterationLimit,
        }

        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col] > self.feasibility_tolerance {
                return PhaseOne::Infeasible;
            }
        }

        // Drive zero-valued artificials out of the basis; rows with no
        // non-artificial entry are redundant and keep their artificial
        for i in 0..n_constraints {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let entering = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance);
            if let Some(col) = entering {
                self.pivot(tableau, i, col);
            }
        }

        // Restore original objective and price out the basic variables
        tableau.data[n_constraints] = original;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio.abs() > 0.0 {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        PhaseOne::Feasible
    }

    /// Pivot until no column below `col_limit` can improve the objective
    fn iterate(&self, tableau: &mut Tableau, col_limit: usize) -> SimplexResult {
        let rhs_col = tableau.width() - 1;
        let mut degenerate_streak = 0;

        for _ in 0..self.max_iterations {
            let bland = degenerate_streak >= self.bland_after;
            let Some(pivot_col) = self.find_pivot_column(tableau, col_limit, bland) else {
                return SimplexResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col, bland) else {
                return SimplexResult::Unbounded;
            };
            if tableau.data[pivot_row][rhs_col].abs() <= self.tolerance {
                degenerate_streak += 1;
            } else {
                degenerate_streak = 0;
            }
            self.pivot(tableau, pivot_row, pivot_col);
        }
        SimplexResult::IterationLimit
    }

    fn find_pivot_column(&self, tableau: &Tableau, col_limit: usize, bland: bool) -> Option<usize> {
        let obj_row = &tableau.data[tableau.basic_vars.len()];

        if bland {
            return (0..col_limit).find(|&j| obj_row[j] > self.tolerance);
        }

        // Look for the most positive reduced cost (can improve objective)
        let mut max_val = self.tolerance;
        let mut max_col = None;
        for (j, &value) in obj_row.iter().enumerate().take(col_limit) {
            if value > max_val {
                max_val = value;
                max_col = Some(j);
            }
        }
        max_col
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize, bland: bool) -> Option<usize> {
        let n_constraints = tableau.basic_vars.len();
        let rhs_col = tableau.width() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..n_constraints {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            match min_row {
                None => {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
                Some(best) => {
                    if ratio < min_ratio - self.tolerance {
                        min_ratio = ratio;
                        min_row = Some(i);
                    } else if bland
                        && (ratio - min_ratio).abs() <= self.tolerance
                        && tableau.basic_vars[i] < tableau.basic_vars[best]
                    {
                        min_row = Some(i);
                    }
                }
            }
        }

        min_row
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        tableau.basic_vars[row] = col;

        // Scale pivot row
        let pivot_val = tableau.data[row][col];
        for value in tableau.data[row].iter_mut() {
            *value /= pivot_val;
        }

        // Eliminate column in other rows
        let pivot_row = tableau.data[row].clone();
        for (i, current) in tableau.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = current[col];
            if factor == 0.0 {
                continue;
            }
            for (value, &p) in current.iter_mut().zip(&pivot_row) {
                *value -= factor * p;
            }
        }
    }

    fn extract_solution(&self, tableau: &Tableau, problem: &LpProblem) -> Solution {
        let n_vars = problem.num_variables();
        let rhs_col = tableau.width() - 1;

        let mut values = vec![0.0; n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < n_vars {
                values[basic] = tableau.data[i][rhs_col].max(0.0);
            }
        }

        let objective_value = problem.objective_value(&values);
        let analysis = self.analyze(tableau, problem, &values);

        Solution::optimal(values, objective_value, analysis)
    }

    fn analyze(&self, tableau: &Tableau, problem: &LpProblem, values: &[f64]) -> Analysis {
        let obj_row = &tableau.data[tableau.basic_vars.len()];
        // Tableau duals belong to the internal maximization
        let sense = if problem.objective.minimize { -1.0 } else { 1.0 };

        let shadow_prices: Vec<ShadowPrice> = problem
            .constraints
            .iter()
            .zip(&tableau.rows)
            .map(|(constraint, row)| {
                let value = sense * row.orientation * row.dual_sign * obj_row[row.dual_col];
                let value = if value.abs() < self.tolerance { 0.0 } else { value };
                let interpretation = if value == 0.0 {
                    "Non-binding constraint".to_string()
                } else if value > 0.0 {
                    format!("Increasing RHS by 1 unit would increase the objective by {:.4}", value)
                } else {
                    format!("Increasing RHS by 1 unit would decrease the objective by {:.4}", -value)
                };
                ShadowPrice {
                    constraint: constraint.name.clone(),
                    value,
                    interpretation,
                }
            })
            .collect();

        let reduced_costs = problem
            .variables
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let is_basic = tableau.basic_vars.contains(&j);
                let reduced_cost = if is_basic { 0.0 } else { -obj_row[j] };
                ReducedCost {
                    variable: name.clone(),
                    value: values[j],
                    reduced_cost,
                    is_basic,
                }
            })
            .collect();

        let binding_constraints = shadow_prices
            .iter()
            .filter(|sp| sp.value != 0.0)
            .map(|sp| sp.constraint.clone())
            .collect();

        Analysis {
            shadow_prices,
            reduced_costs,
            binding_constraints,
        }
    }
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    rows: Vec<RowInfo>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

impl Tableau {
    fn width(&self) -> usize {
        self.data[0].len()
    }
}

/// Where a row's dual value can be read in the objective row
struct RowInfo {
    dual_col: usize,
    dual_sign: f64,
    /// -1 when the row was negated to make its RHS non-negative
    orientation: f64,
}

enum PhaseOne {
    Feasible,
    Infeasible,
    IterationLimit,
}

enum SimplexResult {
    Optimal,
    Unbounded,
    IterationLimit,
}
