/*
 * Copyright (c) 2025 Clément GRENNERAT
 *
 * This program is free software: you can redistribute it and/or modify it under the terms of the
 * GNU General Public License as published by the Free Software Foundation, version 3.
 * This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
 * even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
 * See the GNU General Public License for more details.
 * You should have received a copy of the GNU General Public License along with this program.
 * If not, see https://www.gnu.org/licenses/.
 *
 */

//! Concrete end-to-end scenarios against the whole pipeline (grid, constraints, CP-SAT,
//! relaxation, weights), as opposed to the per-module unit tests living alongside each file.

use crate::config::{SolverConfig, SolverType};
use crate::scheduler::unified::UnifiedSolver;
use chrono::NaiveDate;
use scheduler_dao::model::class::{Class, WeeklySchedule};
use scheduler_dao::model::constraints_config::GlobalConstraints;
use scheduler_dao::model::request::ScheduleRequest;
use scheduler_dao::model::time_slot::TimeSlot;
use std::collections::HashMap;

fn base_request(classes: Vec<Class>, start: NaiveDate, end: NaiveDate, constraints: GlobalConstraints) -> ScheduleRequest {
    ScheduleRequest {
        classes,
        instructor_availability: Vec::new(),
        start_date: start,
        end_date: end,
        constraints,
        options: HashMap::new(),
    }
}

fn exact_config() -> SolverConfig {
    let mut config = SolverConfig::default();
    config.solver_type = SolverType::OrTools;
    config.timeout_seconds = 10;
    config
}

#[test]
fn minimal_feasible_one_class_one_week() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    let class = Class::new("c1", "Reading", "3", WeeklySchedule::default());
    let constraints = GlobalConstraints {
        max_classes_per_day: 1,
        max_classes_per_week: 1,
        min_periods_per_week: 1,
        start_date: start,
        end_date: end,
        ..Default::default()
    };
    let request = base_request(vec![class], start, end, constraints);

    let response = UnifiedSolver::solve(&request, &exact_config()).unwrap();
    assert_eq!(response.assignments.len(), 1);
    let slot = &response.assignments[0].time_slot;
    assert!((1..=5).contains(&slot.day_of_week));
    assert!((1..=8).contains(&slot.period));
}

#[test]
fn required_period_forces_exact_slot() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    let mut schedule = WeeklySchedule::default();
    schedule.required_periods.push(TimeSlot::new(2, 3));
    let class = Class::new("c1", "Reading", "3", schedule);
    let constraints = GlobalConstraints { start_date: start, end_date: end, ..Default::default() };
    let request = base_request(vec![class], start, end, constraints);

    let response = UnifiedSolver::solve(&request, &exact_config()).unwrap();
    assert_eq!(response.assignments.len(), 1);
    let assignment = &response.assignments[0];
    assert_eq!(assignment.time_slot.day_of_week, 2);
    assert_eq!(assignment.time_slot.period, 3);
    assert_eq!(assignment.date, "2025-03-04T00:00:00Z");
}

#[test]
fn conflicts_covering_the_only_day_are_infeasible() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let mut schedule = WeeklySchedule::default();
    for period in TimeSlot::MIN_PERIOD..=TimeSlot::MAX_PERIOD {
        schedule.conflicts.push(TimeSlot::new(1, period));
    }
    let class = Class::new("c1", "Reading", "3", schedule);
    let constraints = GlobalConstraints { start_date: start, end_date: end, ..Default::default() };
    let request = base_request(vec![class], start, end, constraints);

    let mut config = exact_config();
    config.enable_relaxation = false;
    let response = UnifiedSolver::solve(&request, &config).unwrap();
    assert!(response.assignments.is_empty());
    assert!(response.metadata.error.is_some());
}

#[test]
fn daily_limit_binds_then_relaxation_lets_both_classes_land() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let classes = vec![
        Class::new("c1", "Reading", "3", WeeklySchedule::default()),
        Class::new("c2", "Writing", "3", WeeklySchedule::default()),
    ];
    let constraints = GlobalConstraints { max_classes_per_day: 1, start_date: start, end_date: end, ..Default::default() };
    let request = base_request(classes, start, end, constraints);

    let mut without_relaxation = exact_config();
    without_relaxation.enable_relaxation = false;
    let response = UnifiedSolver::solve(&request, &without_relaxation).unwrap();
    assert!(response.assignments.is_empty());
    assert!(response.metadata.error.is_some());

    let mut with_relaxation = exact_config();
    with_relaxation.enable_relaxation = true;
    let response = UnifiedSolver::solve(&request, &with_relaxation).unwrap();
    assert_eq!(response.assignments.len(), 2);
    assert_eq!(response.metadata.relaxation_level, Some(1));
}

#[test]
fn consecutive_cap_forbids_a_triple_but_allows_a_gapped_pair() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let classes = vec![
        Class::new("c1", "A", "3", WeeklySchedule::default()),
        Class::new("c2", "B", "3", WeeklySchedule::default()),
        Class::new("c3", "C", "3", WeeklySchedule::default()),
    ];
    let constraints = GlobalConstraints {
        max_classes_per_day: 3,
        max_classes_per_week: 3,
        min_periods_per_week: 1,
        max_consecutive_classes: 2,
        allow_consecutive_classes: true,
        start_date: start,
        end_date: end,
        ..Default::default()
    };
    let request = base_request(classes, start, end, constraints.clone());

    let response = UnifiedSolver::solve(&request, &exact_config()).unwrap();
    assert_eq!(response.assignments.len(), 3);

    let assignments: Vec<scheduler_dao::model::assignment::Assignment> = response
        .assignments
        .iter()
        .map(|a| scheduler_dao::model::assignment::Assignment::new(a.class_id.clone(), start, a.time_slot.day_of_week, a.time_slot.period))
        .collect();
    let ctx = crate::scheduler::constraints::ValidationContext {
        classes: &request.classes,
        constraints_config: &constraints,
        instructor_availability: &[],
        start_date: start,
    };
    let constraint = crate::scheduler::constraints::Constraint::by_name("consecutive_classes").unwrap();
    assert!(constraint.validate(&assignments, &ctx).is_empty());
}

#[test]
fn avoid_periods_weight_override_changes_the_optimized_score() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let mut schedule = WeeklySchedule::default();
    // Block every period but one, and mark that remaining period as avoided: the solver has
    // no alternative slot, so the optimized score is purely a function of the avoid weight.
    for period in 2..=TimeSlot::MAX_PERIOD {
        schedule.conflicts.push(TimeSlot::new(1, period));
    }
    schedule.avoid_periods.push(TimeSlot::new(1, 1));
    schedule.avoidance_weight = 1.0;
    let class = Class::new("c1", "Reading", "3", schedule);
    let constraints = GlobalConstraints { start_date: start, end_date: end, ..Default::default() };
    let request = base_request(vec![class], start, end, constraints);

    let default_response = UnifiedSolver::solve(&request, &exact_config()).unwrap();

    let mut overridden = exact_config();
    let mut weights = HashMap::new();
    weights.insert("avoid_periods".to_string(), 0.0);
    overridden.weights = Some(weights);
    let overridden_response = UnifiedSolver::solve(&request, &overridden).unwrap();

    assert_eq!(default_response.assignments.len(), 1);
    assert_eq!(overridden_response.assignments.len(), 1);
    assert!(
        default_response.metadata.score > overridden_response.metadata.score,
        "removing the avoid_periods penalty should raise the optimized objective value"
    );
}
