//! Run orchestration: full model first, then per-grade models and diagnosis.

use std::collections::BTreeMap;

use blendopt_solver::{Analysis, Solution, SolutionStatus, Solver, SolverHandle, SolverUsed};

use crate::config::BlendPolicy;
use crate::diagnose::{Diagnosis, Diagnostician};
use crate::error::InputError;
use crate::model::{BlendModel, BuildMode, ModelBuilder};
use crate::property::Property;
use crate::request::BlendRequest;
use crate::violation::blend_quality;

/// Result of one optimization run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BlendReport {
    /// Status of the full multi-grade model
    pub status: SolutionStatus,
    pub solver_used: SolverUsed,
    /// Profit of the full model, when it is optimal
    pub objective_value: Option<f64>,
    /// One entry per grade, in input order
    pub grades: Vec<GradeReport>,
    pub component_usage: Vec<ComponentUsage>,
    /// Dual analysis of the full model, when it is optimal
    pub sensitivity: Option<Analysis>,
}

impl BlendReport {
    pub fn grade(&self, name: &str) -> Option<&GradeReport> {
        self.grades.iter().find(|g| g.grade == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GradeReport {
    pub grade: String,
    pub outcome: GradeOutcome,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
pub enum GradeOutcome {
    Optimal(GradeBlend),
    Infeasible {
        /// Status of the grade's own model
        solver_status: SolutionStatus,
        diagnosis: Diagnosis,
    },
}

impl GradeOutcome {
    pub fn blend(&self) -> Option<&GradeBlend> {
        match self {
            GradeOutcome::Optimal(blend) => Some(blend),
            GradeOutcome::Infeasible { .. } => None,
        }
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            GradeOutcome::Optimal(_) => None,
            GradeOutcome::Infeasible { diagnosis, .. } => Some(diagnosis),
        }
    }
}

/// An optimal blend for one grade.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GradeBlend {
    /// Component id to quantity
    pub blend: BTreeMap<String, f64>,
    pub total_volume: f64,
    pub total_cost: f64,
    pub total_revenue: f64,
    pub profit: f64,
    pub quality: BTreeMap<Property, f64>,
}

/// How much of a component the optimal grades consumed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ComponentUsage {
    pub component: String,
    /// Display name, or the id when there is none
    pub label: String,
    pub availability: f64,
    pub used: f64,
    pub remaining: f64,
}

/// Optimize a request under a policy.
///
/// Input problems fail fast. Anything that goes wrong after validation is
/// reported per grade, and every grade gets exactly one outcome.
pub fn optimize(request: &BlendRequest, policy: &BlendPolicy) -> Result<BlendReport, InputError> {
    let prepared = request.prepare()?;
    let solver = SolverHandle::select_with(
        request.solver,
        Solver::new().with_feasibility_tolerance(policy.tolerance),
    );
    let builder = ModelBuilder::new(
        &request.grades,
        &request.components,
        &prepared.values,
        &prepared.specs,
        &prepared.properties,
        policy,
    );

    tracing::info!(
        component = "optimizer",
        operation = "optimize",
        grades = request.grades.len(),
        components = request.components.len(),
        solver = request.solver.as_str(),
        "starting optimization"
    );

    let (status, full) = match builder.build(BuildMode::Full) {
        Ok(model) => {
            let solution = solver.solve(&model.problem);
            (solution.status, Some((model, solution)))
        }
        Err(err) => {
            tracing::warn!(component = "optimizer", operation = "build", error = %err, "full model could not be built");
            (SolutionStatus::Error, None)
        }
    };

    let report = match full {
        Some((model, solution)) if solution.is_optimal() => {
            let grades = (0..request.grades.len())
                .map(|g| GradeReport {
                    grade: request.grades[g].name.clone(),
                    outcome: GradeOutcome::Optimal(grade_blend(&builder, &model, &solution, g)),
                })
                .collect::<Vec<_>>();
            BlendReport {
                status,
                solver_used: solver.used(),
                objective_value: solution.objective(),
                component_usage: usage(request, &grades),
                grades,
                sensitivity: Some(solution.analysis),
            }
        }
        _ => {
            tracing::info!(
                component = "optimizer",
                operation = "optimize",
                status = status.as_str(),
                "full model not optimal, solving grades separately"
            );
            let diagnostician = Diagnostician::new(&builder, &solver);
            let grades = (0..request.grades.len())
                .map(|g| GradeReport {
                    grade: request.grades[g].name.clone(),
                    outcome: solve_grade(&builder, &solver, &diagnostician, g),
                })
                .collect::<Vec<_>>();
            BlendReport {
                status,
                solver_used: solver.used(),
                objective_value: None,
                component_usage: usage(request, &grades),
                grades,
                sensitivity: None,
            }
        }
    };

    tracing::info!(
        component = "optimizer",
        operation = "optimize",
        status = report.status.as_str(),
        solver = %report.solver_used,
        "optimization finished"
    );
    Ok(report)
}

fn solve_grade(builder: &ModelBuilder<'_>, solver: &SolverHandle, diagnostician: &Diagnostician<'_>, grade: usize) -> GradeOutcome {
    let solution = match builder.build(BuildMode::SingleGrade(grade)) {
        Ok(model) => {
            let solution = solver.solve(&model.problem);
            if solution.is_optimal() {
                return GradeOutcome::Optimal(grade_blend(builder, &model, &solution, grade));
            }
            solution
        }
        Err(err) => {
            tracing::warn!(component = "optimizer", operation = "build", grade, error = %err, "grade model could not be built");
            Solution::error()
        }
    };

    tracing::info!(
        component = "optimizer",
        operation = "solve_grade",
        status = solution.status.as_str(),
        grade = builder.grades()[grade].name.as_str(),
        "grade not optimal, diagnosing"
    );
    GradeOutcome::Infeasible {
        solver_status: solution.status,
        diagnosis: diagnostician.diagnose(grade),
    }
}

fn grade_blend(builder: &ModelBuilder<'_>, model: &BlendModel, solution: &Solution, grade: usize) -> GradeBlend {
    let g = &builder.grades()[grade];
    let components = builder.components();
    let quantities = model.blend(solution, grade);
    let total_volume: f64 = quantities.iter().sum();
    let total_cost: f64 = quantities.iter().zip(components).map(|(q, c)| q * c.cost).sum();
    let total_revenue = g.price * total_volume;

    GradeBlend {
        blend: components
            .iter()
            .zip(&quantities)
            .map(|(c, &q)| (c.name.clone(), q))
            .collect(),
        total_volume,
        total_cost,
        total_revenue,
        profit: total_revenue - total_cost,
        quality: blend_quality(&quantities, builder.values(), builder.properties()),
    }
}

fn usage(request: &BlendRequest, grades: &[GradeReport]) -> Vec<ComponentUsage> {
    request
        .components
        .iter()
        .map(|c| {
            let used: f64 = grades
                .iter()
                .filter_map(|g| g.outcome.blend())
                .map(|b| b.blend.get(&c.name).copied().unwrap_or(0.0))
                .sum();
            ComponentUsage {
                component: c.name.clone(),
                label: c.label().to_string(),
                availability: c.availability,
                used,
                remaining: c.availability - used,
            }
        })
        .collect()
}
