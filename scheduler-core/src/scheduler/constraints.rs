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

//! The fixed, enumerated constraint set. Each variant installs itself into a CP-SAT model via
//! `apply` and is re-checked post-hoc (against both CP-SAT extractions and GA chromosomes) via
//! `validate`. There is no open-world extensibility: callers select by name through
//! [`default_constraints`] or [`Constraint::by_name`].

use crate::grid::{GridKey, VariableGrid};
use crate::scheduler::relaxation::RelaxationState;
use chrono::NaiveDate;
use cp_sat::builder::{BoolVar, CpModelBuilder, LinearExpr};
use scheduler_dao::model::assignment::Assignment;
use scheduler_dao::model::availability::InstructorUnavailability;
use scheduler_dao::model::class::Class;
use scheduler_dao::model::constraints_config::GlobalConstraints;
use scheduler_dao::model::violation::{ConstraintViolation, Severity};
use std::collections::{HashMap, HashSet};

pub type ModelVars = HashMap<GridKey, BoolVar>;

/// Bundles everything `validate` needs to check an assignment list against a request, without
/// threading five separate arguments through every constraint.
pub struct ValidationContext<'a> {
    pub classes: &'a [Class],
    pub constraints_config: &'a GlobalConstraints,
    pub instructor_availability: &'a [InstructorUnavailability],
    pub start_date: NaiveDate,
}

impl<'a> ValidationContext<'a> {
    pub fn from_grid(grid: &'a VariableGrid, constraints_config: &'a GlobalConstraints) -> Self {
        ValidationContext {
            classes: &grid.classes,
            constraints_config,
            instructor_availability: &grid.instructor_availability,
            start_date: grid.start_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    SingleAssignment,
    NoOverlap,
    InstructorAvailability,
    ConflictPeriods,
    RequiredPeriods,
    DailyLimit,
    WeeklyLimit,
    MinimumPeriods,
    ConsecutiveClasses,
    TeacherBreak,
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::SingleAssignment => "single_assignment",
            ConstraintKind::NoOverlap => "no_overlap",
            ConstraintKind::InstructorAvailability => "instructor_availability",
            ConstraintKind::ConflictPeriods => "conflict_periods",
            ConstraintKind::RequiredPeriods => "required_periods",
            ConstraintKind::DailyLimit => "daily_limit",
            ConstraintKind::WeeklyLimit => "weekly_limit",
            ConstraintKind::MinimumPeriods => "minimum_periods",
            ConstraintKind::ConsecutiveClasses => "consecutive_classes",
            ConstraintKind::TeacherBreak => "teacher_break",
        }
    }

    /// Only `DailyLimit` and `WeeklyLimit` have a tabled relaxation extra; every other
    /// constraint is `neverRelax` and ignores relaxation requests.
    pub fn can_relax(&self) -> bool {
        matches!(self, ConstraintKind::DailyLimit | ConstraintKind::WeeklyLimit)
    }

    /// Higher relaxes later, mirroring the source's `relaxation_priority` field (kept for
    /// observability; all relaxable constraints still move together per level).
    pub fn relaxation_priority(&self) -> u8 {
        match self {
            ConstraintKind::DailyLimit => 1,
            ConstraintKind::WeeklyLimit => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub enabled: bool,
    pub category: &'static str,
}

impl Constraint {
    fn new(kind: ConstraintKind, category: &'static str) -> Self {
        Constraint { kind, enabled: true, category }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn by_name(name: &str) -> Option<Constraint> {
        default_constraints().into_iter().find(|c| c.name() == name)
    }

    /// Installs this constraint into the CP-SAT model being built over `grid`/`vars`.
    pub fn apply(
        &self,
        builder: &mut CpModelBuilder,
        grid: &VariableGrid,
        vars: &ModelVars,
        constraints_config: &GlobalConstraints,
        relaxation: &RelaxationState,
    ) {
        if !self.enabled {
            return;
        }
        match self.kind {
            ConstraintKind::SingleAssignment => {
                for class_index in 0..grid.classes.len() {
                    let sum = sum_of(grid.indices_for_class(class_index), grid, vars);
                    builder.add_eq(sum, LinearExpr::from(1));
                }
            }
            ConstraintKind::NoOverlap => {
                for &date in &grid.dates {
                    for period in 1..=8u8 {
                        let indices = grid.indices_for_date_period(date, period);
                        if indices.is_empty() {
                            continue;
                        }
                        let sum = sum_of(indices, grid, vars);
                        builder.add_le(sum, LinearExpr::from(1));
                    }
                }
            }
            ConstraintKind::InstructorAvailability => {
                for key in &grid.keys {
                    let dow = key.day_of_week();
                    if grid.is_instructor_unavailable(key.date, dow, key.period) {
                        if let Some(var) = vars.get(key) {
                            builder.add_eq(LinearExpr::from(var.clone()), LinearExpr::from(0));
                        }
                    }
                }
            }
            ConstraintKind::ConflictPeriods => {
                for key in &grid.keys {
                    let class = &grid.classes[key.class_index];
                    if class.weekly_schedule.is_conflict(&key.time_slot()) {
                        if let Some(var) = vars.get(key) {
                            builder.add_eq(LinearExpr::from(var.clone()), LinearExpr::from(0));
                        }
                    }
                }
            }
            ConstraintKind::RequiredPeriods => {
                for (class_index, class) in grid.classes.iter().enumerate() {
                    if !class.weekly_schedule.has_required_periods() {
                        continue;
                    }
                    let matching: Vec<usize> = grid
                        .indices_for_class(class_index)
                        .iter()
                        .copied()
                        .filter(|&i| class.weekly_schedule.is_required(&grid.keys[i].time_slot()))
                        .collect();
                    let sum = sum_of(&matching, grid, vars);
                    builder.add_eq(sum, LinearExpr::from(1));
                }
            }
            ConstraintKind::DailyLimit => {
                let extra = relaxation.daily_extra() as i64;
                for &date in &grid.dates {
                    let mut indices = Vec::new();
                    for period in 1..=8u8 {
                        indices.extend_from_slice(grid.indices_for_date_period(date, period));
                    }
                    let sum = sum_of(&indices, grid, vars);
                    builder.add_le(sum, LinearExpr::from(constraints_config.max_classes_per_day as i64 + extra));
                }
            }
            ConstraintKind::WeeklyLimit => {
                let extra = relaxation.weekly_extra() as i64;
                for week in grid.weeks() {
                    let sum = sum_of(grid.indices_for_week(week), grid, vars);
                    builder.add_le(sum, LinearExpr::from(constraints_config.max_classes_per_week as i64 + extra));
                }
            }
            ConstraintKind::MinimumPeriods => {
                let last_week = grid.total_weeks.saturating_sub(1);
                for week in grid.weeks() {
                    if week == last_week {
                        // Last week has no lower bound; early placement is instead rewarded by
                        // the FinalWeekCompression objective.
                        continue;
                    }
                    let min = if week == 0 {
                        let present = grid.weekdays_in_week(week);
                        (constraints_config.min_periods_per_week * present) / 5
                    } else {
                        constraints_config.min_periods_per_week
                    };
                    if min == 0 {
                        continue;
                    }
                    let sum = sum_of(grid.indices_for_week(week), grid, vars);
                    builder.add_ge(sum, LinearExpr::from(min as i64));
                }
            }
            ConstraintKind::ConsecutiveClasses => {
                for &date in &grid.dates {
                    for p in 1..=6u8 {
                        let mut indices = Vec::new();
                        for period in [p, p + 1, p + 2] {
                            indices.extend_from_slice(grid.indices_for_date_period(date, period));
                        }
                        let sum = sum_of(&indices, grid, vars);
                        builder.add_le(sum, LinearExpr::from(2));
                    }
                    if !constraints_config.allow_consecutive_classes {
                        for p in 1..=7u8 {
                            let mut indices = Vec::new();
                            for period in [p, p + 1] {
                                indices.extend_from_slice(grid.indices_for_date_period(date, period));
                            }
                            let sum = sum_of(&indices, grid, vars);
                            builder.add_le(sum, LinearExpr::from(1));
                        }
                    }
                }
            }
            ConstraintKind::TeacherBreak => {
                for key in &grid.keys {
                    if constraints_config.required_break_periods.contains(&key.period) {
                        if let Some(var) = vars.get(key) {
                            builder.add_eq(LinearExpr::from(var.clone()), LinearExpr::from(0));
                        }
                    }
                }
            }
        }
    }

    /// Post-hoc check over a concrete assignment list, used both after CP-SAT extraction and
    /// as part of GA feasibility scoring.
    pub fn validate(&self, assignments: &[Assignment], ctx: &ValidationContext) -> Vec<ConstraintViolation> {
        let classes = ctx.classes;
        let constraints_config = ctx.constraints_config;
        let mut violations = Vec::new();
        match self.kind {
            ConstraintKind::SingleAssignment => {
                let mut counts: HashMap<&str, u32> = HashMap::new();
                for a in assignments {
                    *counts.entry(a.class_id.as_str()).or_insert(0) += 1;
                }
                for class in classes {
                    let count = counts.get(class.id.as_str()).copied().unwrap_or(0);
                    if count != 1 {
                        violations.push(
                            ConstraintViolation::new(self.name(), Severity::Critical, format!("class has {} assignments, expected 1", count))
                                .for_class(class.id.clone()),
                        );
                    }
                }
            }
            ConstraintKind::NoOverlap => {
                let mut seen: HashSet<(chrono::NaiveDate, u8)> = HashSet::new();
                for a in assignments {
                    if !seen.insert((a.date, a.period)) {
                        violations.push(ConstraintViolation::new(self.name(), Severity::Critical, "two assignments share a (date, period)"));
                    }
                }
            }
            ConstraintKind::ConflictPeriods => {
                for a in assignments {
                    if let Some(class) = classes.iter().find(|c| c.id == a.class_id) {
                        if class.weekly_schedule.is_conflict(&scheduler_dao::model::time_slot::TimeSlot::new(a.day_of_week, a.period)) {
                            violations.push(
                                ConstraintViolation::new(self.name(), Severity::Critical, "assignment lands on a conflict slot").for_class(a.class_id.clone()),
                            );
                        }
                    }
                }
            }
            ConstraintKind::RequiredPeriods => {
                for class in classes {
                    if !class.weekly_schedule.has_required_periods() {
                        continue;
                    }
                    let matches = assignments
                        .iter()
                        .filter(|a| a.class_id == class.id)
                        .any(|a| class.weekly_schedule.is_required(&scheduler_dao::model::time_slot::TimeSlot::new(a.day_of_week, a.period)));
                    if !matches {
                        violations.push(
                            ConstraintViolation::new(self.name(), Severity::Error, "class did not land on a required period").for_class(class.id.clone()),
                        );
                    }
                }
            }
            ConstraintKind::DailyLimit => {
                let mut per_date: HashMap<chrono::NaiveDate, u32> = HashMap::new();
                for a in assignments {
                    *per_date.entry(a.date).or_insert(0) += 1;
                }
                for (date, count) in per_date {
                    if count > constraints_config.max_classes_per_day {
                        violations.push(ConstraintViolation::new(self.name(), Severity::Warning, format!("{} classes on {}", count, date)));
                    }
                }
            }
            ConstraintKind::WeeklyLimit => {
                let mut per_week: HashMap<u32, u32> = HashMap::new();
                for a in assignments {
                    *per_week.entry(crate::grid::week_index(a.date, ctx.start_date)).or_insert(0) += 1;
                }
                for (week, count) in per_week {
                    if count > constraints_config.max_classes_per_week {
                        violations.push(ConstraintViolation::new(self.name(), Severity::Warning, format!("{} classes in week {}", count, week)));
                    }
                }
            }
            ConstraintKind::MinimumPeriods => {
                let mut per_week: HashMap<u32, u32> = HashMap::new();
                for a in assignments {
                    *per_week.entry(crate::grid::week_index(a.date, ctx.start_date)).or_insert(0) += 1;
                }
                let last_week = per_week.keys().copied().max().unwrap_or(0);
                for (week, count) in &per_week {
                    if *week == last_week {
                        continue;
                    }
                    if *count < constraints_config.min_periods_per_week {
                        violations.push(ConstraintViolation::new(self.name(), Severity::Info, format!("only {} classes in week {}", count, week)));
                    }
                }
            }
            ConstraintKind::ConsecutiveClasses => {
                let mut per_date: HashMap<chrono::NaiveDate, Vec<u8>> = HashMap::new();
                for a in assignments {
                    per_date.entry(a.date).or_default().push(a.period);
                }
                for (date, mut periods) in per_date {
                    periods.sort_unstable();
                    for w in periods.windows(3) {
                        if w[1] == w[0] + 1 && w[2] == w[1] + 1 {
                            violations.push(ConstraintViolation::new(self.name(), Severity::Critical, format!("triple-consecutive periods on {}", date)));
                        }
                    }
                    if !constraints_config.allow_consecutive_classes {
                        for w in periods.windows(2) {
                            if w[1] == w[0] + 1 {
                                violations.push(ConstraintViolation::new(self.name(), Severity::Error, format!("adjacent periods on {}", date)));
                            }
                        }
                    }
                }
            }
            ConstraintKind::TeacherBreak => {
                for a in assignments {
                    if constraints_config.required_break_periods.contains(&a.period) {
                        violations.push(ConstraintViolation::new(self.name(), Severity::Error, "assignment lands on a required break period"));
                    }
                }
            }
            ConstraintKind::InstructorAvailability => {
                for a in assignments {
                    if ctx.instructor_availability.iter().any(|u| u.forbids(a.date, a.day_of_week, a.period)) {
                        violations.push(
                            ConstraintViolation::new(self.name(), Severity::Critical, "assignment lands on an instructor-unavailable slot")
                                .for_class(a.class_id.clone()),
                        );
                    }
                }
            }
        }
        violations
    }
}

fn sum_of(indices: &[usize], grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    indices
        .iter()
        .filter_map(|&i| vars.get(&grid.keys[i]).map(|v| (1i64, v.clone())))
        .collect::<Vec<(i64, BoolVar)>>()
        .into_iter()
        .collect()
}

/// Builds the fixed constraint set, applying the `ENABLE_CONSECUTIVE_CLASSES` and
/// `ENABLE_TEACHER_BREAKS` environment toggles (§6) by disabling the matching constraint
/// rather than omitting it, so `validate_all` still reports on it if a caller re-enables it
/// mid-session via the global weight/constraint admin surface.
pub fn default_constraints() -> Vec<Constraint> {
    use crate::config::SolverConfig;
    let mut consecutive = Constraint::new(ConstraintKind::ConsecutiveClasses, "hard");
    consecutive.enabled = SolverConfig::feature_enabled("ENABLE_CONSECUTIVE_CLASSES", true);
    let mut teacher_break = Constraint::new(ConstraintKind::TeacherBreak, "hard");
    teacher_break.enabled = SolverConfig::feature_enabled("ENABLE_TEACHER_BREAKS", true);

    vec![
        Constraint::new(ConstraintKind::SingleAssignment, "hard"),
        Constraint::new(ConstraintKind::NoOverlap, "hard"),
        Constraint::new(ConstraintKind::InstructorAvailability, "hard"),
        Constraint::new(ConstraintKind::ConflictPeriods, "hard"),
        Constraint::new(ConstraintKind::RequiredPeriods, "hard"),
        Constraint::new(ConstraintKind::DailyLimit, "hard"),
        Constraint::new(ConstraintKind::WeeklyLimit, "hard"),
        Constraint::new(ConstraintKind::MinimumPeriods, "hard"),
        consecutive,
        teacher_break,
    ]
}

pub fn validate_all(constraints: &[Constraint], assignments: &[Assignment], ctx: &ValidationContext) -> Vec<ConstraintViolation> {
    constraints.iter().filter(|c| c.enabled).flat_map(|c| c.validate(assignments, ctx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_dao::model::class::WeeklySchedule;

    fn ctx<'a>(classes: &'a [Class], constraints_config: &'a GlobalConstraints) -> ValidationContext<'a> {
        ValidationContext {
            classes,
            constraints_config,
            instructor_availability: &[],
            start_date: constraints_config.start_date,
        }
    }

    #[test]
    fn single_assignment_flags_missing_class() {
        let class = Class::new("c1", "Class 1", "3", WeeklySchedule::default());
        let constraints_config = GlobalConstraints::default();
        let constraint = Constraint::by_name("single_assignment").unwrap();
        let violations = constraint.validate(&[], &ctx(&[class], &constraints_config));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Critical);
    }

    #[test]
    fn no_overlap_flags_duplicate_slot() {
        let constraints_config = GlobalConstraints::default();
        let date = constraints_config.start_date;
        let assignments = vec![Assignment::new("a", date, 1, 1), Assignment::new("b", date, 1, 1)];
        let constraint = Constraint::by_name("no_overlap").unwrap();
        let violations = constraint.validate(&assignments, &ctx(&[], &constraints_config));
        assert_eq!(violations.len(), 1);
    }
}
