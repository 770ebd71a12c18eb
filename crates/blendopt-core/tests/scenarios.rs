#![allow(clippy::float_cmp)]

use blendopt_core::{
    ActiveBound, BlendPolicy, BlendRequest, Bound, Component, Grade, Property, RelaxMethod, Side, SolutionStatus,
    SpecTable, Stage, optimize, sample,
};
use proptest::prelude::*;

/// The only component cannot cover the grade's minimum volume.
#[test]
fn test_volume_shortfall_is_critical() {
    let request = BlendRequest::new(
        vec![Grade::new("Regular", 100.0, 200.0, 10.0)],
        vec![Component::new("A", 2.0, 50.0)],
        SpecTable::new(),
    );
    let report = optimize(&request, &BlendPolicy::default()).unwrap();
    assert_eq!(report.status, SolutionStatus::Infeasible);

    let diagnosis = report.grades[0].outcome.diagnosis().expect("grade should be diagnosed");
    assert!(diagnosis.reached(Stage::FullRelax), "stages: {:?}", diagnosis.stages);
    assert!(diagnosis.reached(Stage::CriticalIsolation));
    assert_eq!(diagnosis.final_stage(), Some(Stage::Failed));
    assert!(diagnosis.best_effort.is_none());

    let critical: Vec<_> = diagnosis.critical.iter().map(|c| c.bound).collect();
    assert_eq!(
        critical,
        vec![ActiveBound::GradeVolume(Side::Min), ActiveBound::Availability(0)]
    );
    let volume = &diagnosis.critical[0];
    assert_eq!(volume.required, 100.0);
    let achieved = volume.achieved.expect("volume is always measured");
    assert!((achieved - 50.0).abs() < 1e-6, "volume without min: {}", achieved);
    assert!(
        diagnosis
            .narrative
            .iter()
            .any(|line| line.contains("severely over-constrained"))
    );
}

fn unreachable_aromatics() -> BlendRequest {
    BlendRequest::new(
        vec![Grade::new("Regular", 100.0, 100.0, 10.0)],
        vec![
            Component::new("A", 2.0, 500.0).with_property(Property::Aro, 10.0),
            Component::new("B", 3.0, 500.0).with_property(Property::Aro, 20.0),
        ],
        SpecTable::new().with(Property::Aro, "Regular", Bound::at_least(30.0)),
    )
}

/// A bound outside the components' own range.
#[test]
fn test_soft_property_relaxes_selectively() {
    let report = optimize(&unreachable_aromatics(), &BlendPolicy::default()).unwrap();
    let diagnosis = report.grades[0].outcome.diagnosis().unwrap();
    assert_eq!(diagnosis.final_stage(), Some(Stage::SelectiveRelax));

    let best = diagnosis.best_effort.as_ref().unwrap();
    assert_eq!(best.method, RelaxMethod::Selective);
    assert_eq!(best.violations.len(), 1);
    let violation = &best.violations[0];
    assert_eq!(violation.property, Property::Aro);
    assert_eq!(violation.side, Side::Min);
    assert!(!violation.hard);
    assert!((violation.magnitude - 10.0).abs() < 1e-6, "magnitude {}", violation.magnitude);
}

#[test]
fn test_hard_property_needs_full_relaxation() {
    let policy = BlendPolicy::default().with_hard(Property::Aro);
    let report = optimize(&unreachable_aromatics(), &policy).unwrap();
    let diagnosis = report.grades[0].outcome.diagnosis().unwrap();
    assert!(diagnosis.reached(Stage::FullRelax));

    let best = diagnosis.best_effort.as_ref().unwrap();
    assert_eq!(best.method, RelaxMethod::Full);
    assert_eq!(best.violations.len(), 1);
    assert!(best.violations[0].hard);
    // dropping the aromatics minimum alone restores feasibility
    assert!(
        diagnosis
            .critical
            .iter()
            .any(|c| c.bound == ActiveBound::Property(Property::Aro, Side::Min))
    );
}

/// Every specification is satisfiable by the cheapest component.
#[test]
fn test_trivially_feasible_run_is_optimal() {
    let request = BlendRequest::new(
        vec![Grade::new("Regular", 0.0, 100.0, 10.0)],
        vec![
            Component::new("A", 2.0, 1000.0).with_property(Property::Aro, 20.0),
            Component::new("B", 5.0, 1000.0).with_property(Property::Aro, 40.0),
        ],
        SpecTable::new().with(Property::Aro, "Regular", Bound::at_most(35.0)),
    );
    let report = optimize(&request, &BlendPolicy::default()).unwrap();
    assert_eq!(report.status, SolutionStatus::Optimal);
    assert!((report.objective_value.unwrap() - 800.0).abs() < 1e-6);

    let blend = report.grades[0].outcome.blend().unwrap();
    assert!((blend.blend["A"] - 100.0).abs() < 1e-6);
    assert!(blend.blend["B"].abs() < 1e-6);
    assert!((blend.total_cost - 200.0).abs() < 1e-6);
    assert!((blend.total_revenue - 1000.0).abs() < 1e-6);
}

fn competing_minimums(olefin_penalty: f64, ethanol_penalty: f64) -> (BlendRequest, BlendPolicy) {
    let request = BlendRequest::new(
        vec![Grade::new("Regular", 100.0, 100.0, 10.0)],
        vec![
            Component::new("A", 2.0, 500.0).with_property(Property::Olefin, 10.0),
            Component::new("B", 2.0, 500.0).with_property(Property::Eth, 10.0),
        ],
        SpecTable::new()
            .with(Property::Olefin, "Regular", Bound::at_least(10.0))
            .with(Property::Eth, "Regular", Bound::at_least(10.0)),
    );
    let policy = BlendPolicy::default()
        .with_soft(Property::Olefin, olefin_penalty)
        .with_soft(Property::Eth, ethanol_penalty);
    (request, policy)
}

#[test]
fn test_lower_penalty_is_violated_first() {
    for (olefin, ethanol, violated) in [(500.0, 50.0, Property::Eth), (50.0, 500.0, Property::Olefin)] {
        let (request, policy) = competing_minimums(olefin, ethanol);
        let report = optimize(&request, &policy).unwrap();
        let best = report.grades[0]
            .outcome
            .diagnosis()
            .and_then(|d| d.best_effort.as_ref())
            .unwrap();
        let properties: Vec<_> = best.violations.iter().map(|v| v.property).collect();
        assert_eq!(properties, vec![violated], "penalties {} / {}", olefin, ethanol);
    }
}

#[test]
fn test_sample_gives_every_grade_an_outcome() {
    let request = sample::refinery_request();
    let report = optimize(&request, &BlendPolicy::default()).unwrap();
    assert_eq!(report.grades.len(), 3);
    for (grade, expected) in report.grades.iter().zip(["Regular", "Premium", "Super Premium"]) {
        assert_eq!(grade.grade, expected);
        assert!(grade.outcome.blend().is_some() || grade.outcome.diagnosis().is_some());
    }
    assert_eq!(report.component_usage.len(), 10);
    assert!(report.component_usage.iter().all(|u| u.used <= u.availability + 1e-6));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A selectively relaxed blend never breaks a hard specification.
    #[test]
    fn proptest_selective_blend_keeps_hard_bounds(
        sulfur in prop::collection::vec(0.0f64..30.0, 3),
        aromatics in prop::collection::vec(0.0f64..60.0, 3),
        sulfur_max in 1.0f64..20.0,
        aromatics_min in 0.0f64..80.0,
        volume in 10.0f64..200.0,
    ) {
        let components = (0..3)
            .map(|i| {
                Component::new(format!("C{}", i), 1.0 + i as f64, 1000.0)
                    .with_property(Property::Sul, sulfur[i])
                    .with_property(Property::Aro, aromatics[i])
            })
            .collect();
        let request = BlendRequest::new(
            vec![Grade::new("Regular", volume, volume, 10.0)],
            components,
            SpecTable::new()
                .with(Property::Sul, "Regular", Bound::at_most(sulfur_max))
                .with(Property::Aro, "Regular", Bound::at_least(aromatics_min)),
        );
        let report = optimize(&request, &BlendPolicy::default()).unwrap();
        let best = report.grades[0].outcome.diagnosis().and_then(|d| d.best_effort.as_ref());
        if let Some(best) = best.filter(|b| b.method == RelaxMethod::Selective) {
            prop_assert!(best.violations.iter().all(|v| !v.hard), "{:?}", best.violations);
            prop_assert!(best.quality.get(&Property::Sul).copied().unwrap_or(0.0) <= sulfur_max + 1e-6);
        }
    }
}
