//! Infeasibility diagnosis for a single grade.
//!
//! Stages run in a fixed order: confirm, selective relaxation, full
//! relaxation, leave-one-out isolation, verdict. Every attempt builds and
//! solves its own model.

use std::collections::BTreeMap;

use blendopt_solver::{Solution, SolutionStatus, SolverHandle};

use crate::model::{ActiveBound, BlendModel, BuildMode, ModelBuilder};
use crate::property::Property;
use crate::spec::Side;
use crate::units::from_surrogate;
use crate::violation::{Violation, blend_average, blend_quality, check_violations};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stage {
    Confirm,
    SelectiveRelax,
    FullRelax,
    CriticalIsolation,
    Failed,
}

/// How a best-effort blend was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RelaxMethod {
    Selective,
    Full,
}

/// The best compromise found for an infeasible grade.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BestEffort {
    /// Component id to quantity
    pub blend: BTreeMap<String, f64>,
    pub total_volume: f64,
    /// Breached specifications in canonical order
    pub violations: Vec<Violation>,
    pub method: RelaxMethod,
    pub quality: BTreeMap<Property, f64>,
    /// Revenue minus component cost, penalties excluded
    pub profit_if_ignored: f64,
}

/// A bound whose removal alone restores feasibility.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CriticalBound {
    pub bound: ActiveBound,
    pub label: String,
    /// The omitted limit, in external units
    pub required: f64,
    /// Property value, grade volume or component usage reached without it.
    /// `None` for a property bound when the blend is empty.
    pub achieved: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnosis {
    pub grade: String,
    /// Stages entered, in order
    pub stages: Vec<Stage>,
    pub narrative: Vec<String>,
    pub critical: Vec<CriticalBound>,
    pub best_effort: Option<BestEffort>,
}

impl Diagnosis {
    fn new(grade: &str) -> Self {
        Self {
            grade: grade.to_string(),
            stages: Vec::new(),
            narrative: vec![format!("INFEASIBILITY ANALYSIS FOR {}", grade)],
            critical: Vec::new(),
            best_effort: None,
        }
    }

    pub fn reached(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn final_stage(&self) -> Option<Stage> {
        self.stages.last().copied()
    }

    fn say(&mut self, line: impl Into<String>) {
        self.narrative.push(line.into());
    }
}

/// Runs the diagnosis stages for one grade at a time.
pub struct Diagnostician<'a> {
    builder: &'a ModelBuilder<'a>,
    solver: &'a SolverHandle,
}

impl<'a> Diagnostician<'a> {
    pub fn new(builder: &'a ModelBuilder<'a>, solver: &'a SolverHandle) -> Self {
        Self { builder, solver }
    }

    pub fn diagnose(&self, grade: usize) -> Diagnosis {
        let name = self
            .builder
            .grades()
            .get(grade)
            .map_or_else(|| format!("#{}", grade), |g| g.name.clone());
        let span = tracing::info_span!("diagnose", grade = %name);
        let _guard = span.enter();
        let mut diagnosis = Diagnosis::new(&name);
        let policy = self.builder.policy();

        diagnosis.stages.push(Stage::Confirm);
        match self.attempt(BuildMode::SingleGrade(grade)) {
            Ok((status, _)) if status.is_optimal() => {
                diagnosis.say("1. Model is feasible as stated; nothing to diagnose");
                return diagnosis;
            }
            Ok((status, _)) => diagnosis.say(format!("1. CONFIRMED: Model is {} as stated", status)),
            Err(note) => diagnosis.say(format!("1. Could not confirm: {}", note)),
        }

        diagnosis.stages.push(Stage::SelectiveRelax);
        diagnosis.say("2. ATTEMPTING SELECTIVE RELAXATION (keeping regulatory constraints)");
        match self.attempt(BuildMode::SelectiveRelax(grade)) {
            Ok((_, Some((model, solution)))) => {
                let best = self.best_effort(grade, &model, &solution, RelaxMethod::Selective);
                let hard: Vec<_> = policy.hard.iter().map(|p| p.name()).collect();
                diagnosis.say("   Found solution with selective relaxation");
                diagnosis.say(format!("   Hard constraints maintained: {}", hard.join(", ")));
                diagnosis.say(format!(
                    "   SOLUTION FOUND: {} soft specification(s) violated",
                    best.violations.len()
                ));
                tracing::info!(
                    component = "diagnose",
                    operation = "selective_relax",
                    status = "optimal",
                    violations = best.violations.len(),
                    "selective relaxation succeeded"
                );
                diagnosis.best_effort = Some(best);
                return diagnosis;
            }
            Ok((status, _)) => diagnosis.say(format!(
                "   Selective relaxation failed ({}): hard constraints too restrictive",
                status
            )),
            Err(note) => diagnosis.say(format!("   Selective relaxation could not be built: {}", note)),
        }

        diagnosis.stages.push(Stage::FullRelax);
        diagnosis.say("3. ATTEMPTING FULL RELAXATION (every property specification can be violated)");
        let penalty = policy.full_relax_penalty;
        let full_relaxed = match self.attempt(BuildMode::FullRelax { grade, penalty }) {
            Ok((_, Some((model, solution)))) => {
                let best = self.best_effort(grade, &model, &solution, RelaxMethod::Full);
                diagnosis.say("   Found solution with full relaxation");
                diagnosis.say("   Even regulatory constraints had to be violated");
                diagnosis.say("   Problem is severely over-constrained; consider relaxing several specifications");
                diagnosis.best_effort = Some(best);
                true
            }
            Ok((status, _)) => {
                diagnosis.say(format!("   Full relaxation failed ({})", status));
                false
            }
            Err(note) => {
                diagnosis.say(format!("   Full relaxation could not be built: {}", note));
                false
            }
        };

        if policy.isolate_critical {
            diagnosis.stages.push(Stage::CriticalIsolation);
            diagnosis.say("4. ISOLATING CRITICAL CONSTRAINTS (leave one out)");
            self.isolate(grade, &mut diagnosis);
        }

        if !full_relaxed {
            diagnosis.stages.push(Stage::Failed);
            diagnosis.say("NO SOLUTION FOUND: problem is severely over-constrained");
            if diagnosis.critical.is_empty() {
                diagnosis.say("   No single fix restores feasibility; review all specifications");
            } else {
                let labels = diagnosis
                    .critical
                    .iter()
                    .map(|c| c.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                diagnosis.say(format!("   Relaxing any one of these restores feasibility: {}", labels));
            }
        }

        tracing::info!(
            component = "diagnose",
            operation = "diagnose",
            status = if full_relaxed { "full_relax" } else { "failed" },
            critical = diagnosis.critical.len(),
            "diagnosis finished"
        );
        diagnosis
    }

    /// Build and solve one variant. A build failure comes back as a note.
    fn attempt(
        &self,
        mode: BuildMode,
    ) -> Result<(SolutionStatus, Option<(BlendModel, Solution)>), String> {
        let model = self.builder.build(mode).map_err(|err| {
            tracing::warn!(component = "diagnose", operation = "build", error = %err, "model build failed");
            err.to_string()
        })?;
        let solution = self.solver.solve(&model.problem);
        let status = solution.status;
        Ok((status, status.is_optimal().then_some((model, solution))))
    }

    fn isolate(&self, grade: usize, diagnosis: &mut Diagnosis) {
        let bounds = self.builder.active_bounds(grade);
        for bound in bounds {
            let model = match self.builder.build_without(grade, bound) {
                Ok(model) => model,
                Err(err) => {
                    diagnosis.say(format!("   Skipped {}: {}", self.builder.describe(grade, bound), err));
                    continue;
                }
            };
            let solution = self.solver.solve(&model.problem);
            if !solution.is_optimal() {
                continue;
            }
            let blend = model.blend(&solution, grade);
            let (required, achieved) = self.measure(grade, bound, &blend);
            let label = self.builder.describe(grade, bound);
            let line = match achieved {
                Some(value) => format!(
                    "   CRITICAL: {} (limit {:.4}, reaches {:.4} without it)",
                    label, required, value
                ),
                None => format!("   CRITICAL: {} (limit {:.4}, empty blend without it)", label, required),
            };
            diagnosis.say(line);
            diagnosis.critical.push(CriticalBound {
                bound,
                label,
                required,
                achieved,
            });
        }
        if diagnosis.critical.is_empty() {
            diagnosis.say("   No single constraint removal restores feasibility");
        }
    }

    /// The omitted limit and what the blend reaches without it
    fn measure(&self, grade: usize, bound: ActiveBound, blend: &[f64]) -> (f64, Option<f64>) {
        let g = &self.builder.grades()[grade];
        let components = self.builder.components();
        match bound {
            ActiveBound::GradeVolume(side) => {
                let limit = match side {
                    Side::Min => g.min_volume,
                    Side::Max => g.max_volume,
                };
                (limit, Some(blend.iter().sum()))
            }
            ActiveBound::Availability(c) => (components[c].availability, Some(blend[c])),
            ActiveBound::MinUsage(c) => (components[c].min_usage, Some(blend[c])),
            ActiveBound::Property(property, side) => {
                let bound = self.builder.specs().get(property, &g.name);
                let limit = bound.active(side).unwrap_or(f64::NAN);
                let achieved = blend_average(blend, self.builder.values(), property)
                    .map(|value| from_surrogate(property, value));
                (from_surrogate(property, limit), achieved)
            }
        }
    }

    fn best_effort(
        &self,
        grade: usize,
        model: &BlendModel,
        solution: &Solution,
        method: RelaxMethod,
    ) -> BestEffort {
        let g = &self.builder.grades()[grade];
        let components = self.builder.components();
        let values = self.builder.values();
        let properties = self.builder.properties();
        let quantities = model.blend(solution, grade);

        let total_volume: f64 = quantities.iter().sum();
        let cost: f64 = quantities.iter().zip(components).map(|(q, c)| q * c.cost).sum();
        let violations = check_violations(&quantities, values, self.builder.specs(), &g.name, properties, self.builder.policy())
            .into_values()
            .collect();

        BestEffort {
            blend: components
                .iter()
                .zip(&quantities)
                .map(|(c, &q)| (c.name.clone(), q))
                .collect(),
            total_volume,
            violations,
            method,
            quality: blend_quality(&quantities, values, properties),
            profit_if_ignored: g.price * total_volume - cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlendPolicy;
    use crate::request::{BlendRequest, Component, Grade};
    use crate::spec::{Bound, SpecTable};
    use blendopt_solver::SolverChoice;

    fn run(req: &BlendRequest, policy: &BlendPolicy, grade: usize) -> Diagnosis {
        let prepared = req.prepare().unwrap();
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, policy);
        let solver = SolverHandle::select(SolverChoice::Simplex);
        Diagnostician::new(&builder, &solver).diagnose(grade)
    }

    #[test]
    fn test_feasible_grade_is_a_no_op() {
        let req = BlendRequest::new(
            vec![Grade::new("G", 10.0, 100.0, 10.0)],
            vec![Component::new("A", 2.0, 500.0)],
            SpecTable::new(),
        );
        let diagnosis = run(&req, &BlendPolicy::default(), 0);
        assert_eq!(diagnosis.stages, vec![Stage::Confirm]);
        assert!(diagnosis.best_effort.is_none());
        assert!(diagnosis.narrative[1].contains("feasible as stated"));
    }

    #[test]
    fn test_soft_violation_relaxed_selectively() {
        let req = BlendRequest::new(
            vec![Grade::new("G", 100.0, 100.0, 10.0)],
            vec![
                Component::new("A", 2.0, 500.0).with_property(Property::Olefin, 20.0),
                Component::new("B", 3.0, 500.0).with_property(Property::Olefin, 30.0),
            ],
            SpecTable::new().with(Property::Olefin, "G", Bound::at_most(15.0)),
        );
        let diagnosis = run(&req, &BlendPolicy::default(), 0);
        assert_eq!(diagnosis.final_stage(), Some(Stage::SelectiveRelax));
        let best = diagnosis.best_effort.unwrap();
        assert_eq!(best.method, RelaxMethod::Selective);
        assert!((best.blend["A"] - 100.0).abs() < 1e-6);
        assert_eq!(best.violations.len(), 1);
        assert_eq!(best.violations[0].property, Property::Olefin);
        assert!((best.violations[0].magnitude - 5.0).abs() < 1e-6);
        assert!((best.profit_if_ignored - 800.0).abs() < 1e-6);
        assert!((best.quality[&Property::Olefin] - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_critical_isolation_skipped_when_disabled() {
        let req = BlendRequest::new(
            vec![Grade::new("G", 100.0, 200.0, 10.0)],
            vec![Component::new("A", 2.0, 50.0)],
            SpecTable::new(),
        );
        let policy = BlendPolicy::default().with_isolate_critical(false);
        let diagnosis = run(&req, &policy, 0);
        assert_eq!(
            diagnosis.stages,
            vec![Stage::Confirm, Stage::SelectiveRelax, Stage::FullRelax, Stage::Failed]
        );
        assert!(diagnosis.critical.is_empty());
        assert!(diagnosis.narrative.iter().any(|l| l.contains("No single fix")));
    }

    #[test]
    fn test_empty_blend_has_no_achieved_octane() {
        let req = BlendRequest::new(
            vec![Grade::new("G", 0.0, 100.0, 10.0)],
            vec![
                Component::new("A", 2.0, 500.0).with_property(Property::Ron, 88.0),
                Component::new("B", 3.0, 500.0).with_property(Property::Ron, 96.0),
            ],
            SpecTable::new().with(Property::Ron, "G", Bound::at_least(91.0)),
        );
        let prepared = req.prepare().unwrap();
        let policy = BlendPolicy::default();
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, &policy);
        let solver = SolverHandle::select(SolverChoice::Simplex);
        let diagnostician = Diagnostician::new(&builder, &solver);
        let bound = ActiveBound::Property(Property::Roi, Side::Min);

        let (required, achieved) = diagnostician.measure(0, bound, &[0.0, 0.0]);
        assert!((required - 91.0).abs() < 1e-9, "limit in RON: {}", required);
        assert_eq!(achieved, None);

        let (_, achieved) = diagnostician.measure(0, bound, &[0.0, 10.0]);
        assert!((achieved.unwrap() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_model_error_becomes_a_note() {
        let req = BlendRequest::new(
            vec![Grade::new("G", 100.0, 100.0, 10.0)],
            vec![
                Component::new("A", 2.0, 500.0).with_property(Property::Aro, 50.0),
            ],
            SpecTable::new().with(Property::Aro, "G", Bound::at_most(35.0)),
        );
        let policy = BlendPolicy::default()
            .with_soft(Property::Aro, f64::INFINITY)
            .with_full_relax_penalty(100.0);
        let diagnosis = run(&req, &policy, 0);
        assert!(diagnosis.narrative.iter().any(|l| l.contains("could not be built")));
        // diagnosis carries on to full relaxation
        let best = diagnosis.best_effort.unwrap();
        assert_eq!(best.method, RelaxMethod::Full);
        assert_eq!(best.violations.len(), 1);
    }
}
