//! Linear program construction for the multi-grade blend.
//!
//! Each grade in scope gets one non-negative blend column per component.
//! Property bounds are written against the grade's own volume:
//! `Σ value·x ≥ bound·Σ x` becomes `Σ (value − bound)·x ≥ 0`, so every
//! property row has a zero right-hand side. Soft rows carry one slack column
//! that the objective pays for.

use blendopt_solver::{ConstraintOp, LpProblem, Solution};

use crate::config::BlendPolicy;
use crate::error::ModelError;
use crate::property::{Property, PropertyValues};
use crate::request::{Component, Grade};
use crate::spec::{ResolvedSpecs, Side};

/// Which variant of the model to build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildMode {
    /// Every grade, all constraints hard
    Full,
    /// One grade, all constraints hard
    SingleGrade(usize),
    /// One grade; properties outside the policy's hard set get penalized slack
    SelectiveRelax(usize),
    /// One grade; every property gets slack at a uniform penalty
    FullRelax { grade: usize, penalty: f64 },
}

impl BuildMode {
    fn grade(self) -> Option<usize> {
        match self {
            BuildMode::Full => None,
            BuildMode::SingleGrade(g) | BuildMode::SelectiveRelax(g) => Some(g),
            BuildMode::FullRelax { grade, .. } => Some(grade),
        }
    }
}

/// One bound that currently constrains a grade's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActiveBound {
    GradeVolume(Side),
    /// Component by input position
    Availability(usize),
    MinUsage(usize),
    Property(Property, Side),
}

/// A penalized slack column.
#[derive(Debug, Clone, PartialEq)]
pub struct Slack {
    pub grade: usize,
    pub property: Property,
    pub side: Side,
    pub column: usize,
    pub penalty: f64,
}

/// A built, unsolved model plus the column layout needed to read a solution.
#[derive(Debug, Clone)]
pub struct BlendModel {
    pub problem: LpProblem,
    pub mode: BuildMode,
    /// Grade indices in scope, in column order
    pub grades: Vec<usize>,
    pub slacks: Vec<Slack>,
    components: usize,
}

impl BlendModel {
    /// Blend column of `(grade, component)`, if the grade is in scope
    pub fn column(&self, grade: usize, component: usize) -> Option<usize> {
        let position = self.grades.iter().position(|&g| g == grade)?;
        (component < self.components).then_some(position * self.components + component)
    }

    /// Quantity of each component in `grade`, in component order.
    /// Solver noise below zero reads as zero.
    pub fn blend(&self, solution: &Solution, grade: usize) -> Vec<f64> {
        (0..self.components)
            .map(|c| {
                self.column(grade, c)
                    .map(|col| solution.value(col).max(0.0))
                    .unwrap_or(0.0)
            })
            .collect()
    }
}

/// Builds fresh, independent models from one validated request.
pub struct ModelBuilder<'a> {
    grades: &'a [Grade],
    components: &'a [Component],
    values: &'a [PropertyValues],
    specs: &'a ResolvedSpecs,
    properties: &'a [Property],
    policy: &'a BlendPolicy,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        grades: &'a [Grade],
        components: &'a [Component],
        values: &'a [PropertyValues],
        specs: &'a ResolvedSpecs,
        properties: &'a [Property],
        policy: &'a BlendPolicy,
    ) -> Self {
        Self {
            grades,
            components,
            values,
            specs,
            properties,
            policy,
        }
    }

    pub fn grades(&self) -> &'a [Grade] {
        self.grades
    }

    pub fn components(&self) -> &'a [Component] {
        self.components
    }

    pub fn values(&self) -> &'a [PropertyValues] {
        self.values
    }

    pub fn specs(&self) -> &'a ResolvedSpecs {
        self.specs
    }

    pub fn properties(&self) -> &'a [Property] {
        self.properties
    }

    pub fn policy(&self) -> &'a BlendPolicy {
        self.policy
    }

    pub fn build(&self, mode: BuildMode) -> Result<BlendModel, ModelError> {
        self.build_inner(mode, None)
    }

    /// The single-grade model with exactly one active bound left out
    pub fn build_without(&self, grade: usize, omit: ActiveBound) -> Result<BlendModel, ModelError> {
        self.build_inner(BuildMode::SingleGrade(grade), Some(omit))
    }

    /// Bounds that constrain `grade`'s single-grade model, in isolation order:
    /// volume min then max, then availability and minimum usage per component,
    /// then property bounds in canonical order, min before max.
    pub fn active_bounds(&self, grade: usize) -> Vec<ActiveBound> {
        let Some(g) = self.grades.get(grade) else {
            return Vec::new();
        };
        let mut bounds = Vec::new();
        if g.min_volume > 0.0 {
            bounds.push(ActiveBound::GradeVolume(Side::Min));
        }
        if g.max_volume.is_finite() {
            bounds.push(ActiveBound::GradeVolume(Side::Max));
        }
        for (c, component) in self.components.iter().enumerate() {
            bounds.push(ActiveBound::Availability(c));
            if component.min_usage > 0.0 {
                bounds.push(ActiveBound::MinUsage(c));
            }
        }
        for &property in self.properties {
            let bound = self.specs.get(property, &g.name);
            for side in [Side::Min, Side::Max] {
                if bound.active(side).is_some() {
                    bounds.push(ActiveBound::Property(property, side));
                }
            }
        }
        bounds
    }

    /// Human-readable name of a bound, using external property names
    pub fn describe(&self, grade: usize, bound: ActiveBound) -> String {
        let grade_name = self.grades.get(grade).map_or("?", |g| g.name.as_str());
        let component = |c: usize| self.components.get(c).map_or("?", |c| c.name.as_str());
        match bound {
            ActiveBound::GradeVolume(side) => format!("{} volume {}", grade_name, side),
            ActiveBound::Availability(c) => format!("{} availability", component(c)),
            ActiveBound::MinUsage(c) => format!("{} minimum usage", component(c)),
            ActiveBound::Property(p, side) => format!("{} {} {}", grade_name, p.display(), side),
        }
    }

    fn build_inner(&self, mode: BuildMode, omit: Option<ActiveBound>) -> Result<BlendModel, ModelError> {
        let scope: Vec<usize> = match mode.grade() {
            Some(g) if g >= self.grades.len() => return Err(ModelError::UnknownGrade(g)),
            Some(g) => vec![g],
            None => (0..self.grades.len()).collect(),
        };
        let n_comp = self.components.len();
        let n_blend = scope.len() * n_comp;
        let keeps = |bound: ActiveBound| omit != Some(bound);

        let mut variables = Vec::with_capacity(n_blend);
        for &g in &scope {
            for component in self.components {
                variables.push(format!("Blend_{}_{}", self.grades[g].name, component.name));
            }
        }

        // slack columns come after every blend column
        let mut slacks = Vec::new();
        for &g in &scope {
            for &property in self.properties {
                let bound = self.specs.get(property, &self.grades[g].name);
                for side in [Side::Min, Side::Max] {
                    if bound.active(side).is_none() || !keeps(ActiveBound::Property(property, side)) {
                        continue;
                    }
                    let Some(penalty) = self.penalty(mode, property)? else {
                        continue;
                    };
                    let column = n_blend + slacks.len();
                    variables.push(format!(
                        "Slack_{}_{}_{}",
                        self.grades[g].name,
                        property.name(),
                        side
                    ));
                    slacks.push(Slack {
                        grade: g,
                        property,
                        side,
                        column,
                        penalty,
                    });
                }
            }
        }

        let n = variables.len();
        let mut problem = LpProblem::new(variables);

        let mut objective = vec![0.0; n];
        for (position, &g) in scope.iter().enumerate() {
            for (c, component) in self.components.iter().enumerate() {
                objective[position * n_comp + c] = self.grades[g].price - component.cost;
            }
        }
        for slack in &slacks {
            objective[slack.column] = -slack.penalty;
        }
        problem.set_objective(objective, false);

        for (position, &g) in scope.iter().enumerate() {
            let grade = &self.grades[g];
            let mut total = vec![0.0; n];
            total[position * n_comp..(position + 1) * n_comp].fill(1.0);
            if keeps(ActiveBound::GradeVolume(Side::Min)) {
                problem.add_constraint(format!("{}_Min", grade.name), total.clone(), ConstraintOp::Ge, grade.min_volume);
            }
            if grade.max_volume.is_finite() && keeps(ActiveBound::GradeVolume(Side::Max)) {
                problem.add_constraint(format!("{}_Max", grade.name), total, ConstraintOp::Le, grade.max_volume);
            }
        }

        for (c, component) in self.components.iter().enumerate() {
            let mut usage = vec![0.0; n];
            for position in 0..scope.len() {
                usage[position * n_comp + c] = 1.0;
            }
            if component.min_usage > 0.0 && keeps(ActiveBound::MinUsage(c)) {
                problem.add_constraint(format!("{}_Min_Comp", component.name), usage.clone(), ConstraintOp::Ge, component.min_usage);
            }
            if keeps(ActiveBound::Availability(c)) {
                problem.add_constraint(
                    format!("{}_Availability", component.name),
                    usage,
                    ConstraintOp::Le,
                    component.availability,
                );
            }
        }

        for (position, &g) in scope.iter().enumerate() {
            let grade = &self.grades[g];
            for &property in self.properties {
                let bound = self.specs.get(property, &grade.name);
                for side in [Side::Min, Side::Max] {
                    let Some(limit) = bound.active(side) else {
                        continue;
                    };
                    if !keeps(ActiveBound::Property(property, side)) {
                        continue;
                    }
                    let mut row = vec![0.0; n];
                    for (c, values) in self.values.iter().enumerate() {
                        row[position * n_comp + c] = values[property] - limit;
                    }
                    let slack = slacks
                        .iter()
                        .find(|s| s.grade == g && s.property == property && s.side == side);
                    let (suffix, op) = match side {
                        Side::Min => ("Min", ConstraintOp::Ge),
                        Side::Max => ("Max", ConstraintOp::Le),
                    };
                    if let Some(slack) = slack {
                        row[slack.column] = match side {
                            Side::Min => 1.0,
                            Side::Max => -1.0,
                        };
                    }
                    problem.add_constraint(format!("{}_{}_{}", grade.name, property.name(), suffix), row, op, 0.0);
                }
            }
        }

        if let Some(name) = problem.first_non_finite() {
            return Err(ModelError::NonFinite(name));
        }

        Ok(BlendModel {
            problem,
            mode,
            grades: scope,
            slacks,
            components: n_comp,
        })
    }

    /// Penalty for a property's slack in this mode, `None` when it stays hard
    fn penalty(&self, mode: BuildMode, property: Property) -> Result<Option<f64>, ModelError> {
        let penalty = match mode {
            BuildMode::Full | BuildMode::SingleGrade(_) => return Ok(None),
            BuildMode::SelectiveRelax(_) if self.policy.is_hard(property) => return Ok(None),
            BuildMode::SelectiveRelax(_) => self.policy.penalty_for(property),
            BuildMode::FullRelax { penalty, .. } => penalty,
        };
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(ModelError::InvalidPenalty {
                property: property.display().name().to_string(),
                penalty,
            });
        }
        Ok(Some(penalty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::BlendRequest;
    use crate::spec::{Bound, SpecTable};
    use crate::units::octane_to_surrogate;
    use blendopt_solver::Solver;

    fn request() -> BlendRequest {
        BlendRequest::new(
            vec![
                Grade::new("Regular", 10.0, 100.0, 10.0),
                Grade::new("Premium", 0.0, f64::INFINITY, 12.0),
            ],
            vec![
                Component::new("A", 2.0, 80.0)
                    .with_property(Property::Aro, 10.0)
                    .with_property(Property::Ron, 88.0),
                Component::new("B", 5.0, 80.0)
                    .with_min_usage(5.0)
                    .with_property(Property::Aro, 40.0)
                    .with_property(Property::Ron, 98.0),
            ],
            SpecTable::new()
                .with(Property::Aro, "Regular", Bound::new(0.0, 35.0))
                .with(Property::Ron, "Regular", Bound::at_least(91.0))
                .with(Property::Sul, "Regular", Bound::at_most(0.0)),
        )
    }

    #[test]
    fn test_full_model_layout() {
        let req = request();
        let prepared = req.prepare().unwrap();
        let policy = BlendPolicy::default();
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, &policy);

        let model = builder.build(BuildMode::Full).unwrap();
        assert_eq!(model.problem.num_variables(), 4);
        assert!(model.slacks.is_empty());
        assert_eq!(model.column(1, 1), Some(3));
        assert_eq!(model.problem.objective.coefficients, vec![8.0, 5.0, 10.0, 7.0]);

        // Premium has no finite max and no specs
        assert!(model.problem.constraint("Premium_Max").is_none());
        assert!(model.problem.constraint("Regular_Max").is_some());
        let availability = model.problem.constraint("B_Availability").unwrap();
        assert_eq!(availability.coefficients, vec![0.0, 1.0, 0.0, 1.0]);
        assert!(model.problem.constraint("B_Min_Comp").is_some());
        assert!(model.problem.constraint("A_Min_Comp").is_none());

        // zero minimum is no bound, zero maximum is
        assert!(model.problem.constraint("Regular_ARO_Min").is_none());
        assert!(model.problem.constraint("Regular_SUL_Max").is_some());

        // octane is constrained through its surrogate only
        assert!(model.problem.constraint("Regular_RON_Min").is_none());
        let roi = model.problem.constraint("Regular_ROI_Min").unwrap();
        let limit = octane_to_surrogate(91.0);
        assert!((roi.coefficients[0] - (octane_to_surrogate(88.0) - limit)).abs() < 1e-12);
        assert_eq!(roi.rhs, 0.0);
    }

    #[test]
    fn test_grade_and_component_sharing_an_id() {
        let req = BlendRequest::new(
            vec![Grade::new("Base", 10.0, 100.0, 10.0)],
            vec![Component::new("Base", 2.0, 80.0).with_min_usage(5.0)],
            SpecTable::new(),
        );
        let prepared = req.prepare().unwrap();
        let policy = BlendPolicy::default();
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, &policy);

        let model = builder.build(BuildMode::Full).unwrap();
        let names: Vec<_> = model.problem.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Base_Min", "Base_Max", "Base_Min_Comp", "Base_Availability"]);
        assert_eq!(model.problem.constraint("Base_Min").unwrap().rhs, 10.0);
        assert_eq!(model.problem.constraint("Base_Min_Comp").unwrap().rhs, 5.0);
    }

    #[test]
    fn test_selective_relax_adds_slack_for_soft_bounds_only() {
        let req = request();
        let prepared = req.prepare().unwrap();
        let policy = BlendPolicy::default();
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, &policy);

        let model = builder.build(BuildMode::SelectiveRelax(0)).unwrap();
        assert_eq!(model.grades, vec![0]);
        assert_eq!(model.slacks.len(), 1);
        let slack = &model.slacks[0];
        assert_eq!((slack.property, slack.side, slack.penalty), (Property::Aro, Side::Max, 20000.0));
        assert_eq!(model.problem.objective.coefficients[slack.column], -20000.0);
        let row = model.problem.constraint("Regular_ARO_Max").unwrap();
        assert_eq!(row.coefficients[slack.column], -1.0);

        let relaxed = builder.build(BuildMode::FullRelax { grade: 0, penalty: 1000.0 }).unwrap();
        // ARO max, ROI min, SUL max
        assert_eq!(relaxed.slacks.len(), 3);
        assert!(relaxed.slacks.iter().all(|s| s.penalty == 1000.0));
    }

    #[test]
    fn test_invalid_penalty_is_model_error() {
        let req = request();
        let prepared = req.prepare().unwrap();
        let policy = BlendPolicy::default().with_soft(Property::Aro, -5.0);
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, &policy);

        assert!(matches!(
            builder.build(BuildMode::SelectiveRelax(0)),
            Err(ModelError::InvalidPenalty { .. })
        ));
        assert!(matches!(
            builder.build(BuildMode::FullRelax { grade: 0, penalty: f64::NAN }),
            Err(ModelError::InvalidPenalty { .. })
        ));
        assert!(matches!(builder.build(BuildMode::SingleGrade(7)), Err(ModelError::UnknownGrade(7))));
        assert!(builder.build(BuildMode::SingleGrade(0)).is_ok());
    }

    #[test]
    fn test_active_bounds_and_leave_one_out() {
        let req = request();
        let prepared = req.prepare().unwrap();
        let policy = BlendPolicy::default();
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, &policy);

        let bounds = builder.active_bounds(0);
        assert_eq!(
            bounds,
            vec![
                ActiveBound::GradeVolume(Side::Min),
                ActiveBound::GradeVolume(Side::Max),
                ActiveBound::Availability(0),
                ActiveBound::Availability(1),
                ActiveBound::MinUsage(1),
                ActiveBound::Property(Property::Sul, Side::Max),
                ActiveBound::Property(Property::Roi, Side::Min),
                ActiveBound::Property(Property::Aro, Side::Max),
            ]
        );
        assert_eq!(builder.describe(0, bounds[6]), "Regular RON min");
        assert_eq!(builder.describe(0, bounds[4]), "B minimum usage");

        let full = builder.build(BuildMode::SingleGrade(0)).unwrap();
        for bound in bounds {
            let without = builder.build_without(0, bound).unwrap();
            assert_eq!(without.problem.num_constraints(), full.problem.num_constraints() - 1, "{:?}", bound);
        }
    }

    #[test]
    fn test_models_solve_and_read_back() {
        let req = request();
        let prepared = req.prepare().unwrap();
        let policy = BlendPolicy::default();
        let builder = ModelBuilder::new(&req.grades, &req.components, &prepared.values, &prepared.specs, &prepared.properties, &policy);

        // RON 91 needs roughly 29% of B; the rest goes to the cheaper A
        let model = builder.build(BuildMode::SingleGrade(0)).unwrap();
        let solution = Solver::new().solve(&model.problem);
        assert!(solution.is_optimal(), "status {}", solution.status);
        let blend = model.blend(&solution, 0);
        let total: f64 = blend.iter().sum();
        assert!((total - 100.0).abs() < 1e-6);
        let aro = (10.0 * blend[0] + 40.0 * blend[1]) / total;
        assert!(aro <= 35.0 + 1e-6);
    }
}
