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

use chrono::{Datelike, Days, NaiveDate, Weekday};
use indexmap::IndexMap;
use scheduler_dao::error::SolveError;
use scheduler_dao::model::availability::InstructorUnavailability;
use scheduler_dao::model::class::Class;
use scheduler_dao::model::request::ScheduleRequest;
use scheduler_dao::model::time_slot::TimeSlot;
use std::collections::HashMap;

/// Converts a chrono weekday into the wire-level 1=Monday..5=Friday numbering. Weekend
/// dates are never produced by `weekdays_in_range` and never appear here.
pub fn day_of_week(date: NaiveDate) -> u8 {
    match date.weekday() {
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat | Weekday::Sun => 0,
    }
}

/// All weekday (Mon-Fri) dates in `[start, end]`, inclusive.
pub fn weekdays_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        if day_of_week(cursor) != 0 {
            dates.push(cursor);
        }
        cursor = cursor.checked_add_days(Days::new(1)).expect("date overflow");
    }
    dates
}

pub fn week_index(date: NaiveDate, start_date: NaiveDate) -> u32 {
    ((date - start_date).num_days() / 7) as u32
}

/// One surviving (class, date, period) decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    pub class_index: usize,
    pub date: NaiveDate,
    pub period: u8,
}

impl GridKey {
    pub fn day_of_week(&self) -> u8 {
        day_of_week(self.date)
    }

    pub fn time_slot(&self) -> TimeSlot {
        TimeSlot::new(self.day_of_week(), self.period)
    }
}

/// The pruned Cartesian product of classes, weekdays-in-range and periods, plus the lookup
/// indices the constraint/objective set and the CP-SAT driver need.
pub struct VariableGrid {
    pub classes: Vec<Class>,
    pub dates: Vec<NaiveDate>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_weeks: u32,
    pub instructor_availability: Vec<InstructorUnavailability>,
    /// Every surviving decision point, in deterministic (class, date, period) order.
    pub keys: Vec<GridKey>,
    by_class: HashMap<usize, Vec<usize>>,
    by_date_period: HashMap<(NaiveDate, u8), Vec<usize>>,
    by_week: HashMap<u32, Vec<usize>>,
    by_class_week: HashMap<(usize, u32), Vec<usize>>,
}

impl VariableGrid {
    pub fn build(request: &ScheduleRequest) -> Result<Self, SolveError> {
        let dates = weekdays_in_range(request.start_date, request.end_date);
        let total_weeks = if dates.is_empty() {
            0
        } else {
            week_index(*dates.last().unwrap(), request.start_date) + 1
        };

        let mut keys = Vec::new();
        let mut by_class: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut by_date_period: HashMap<(NaiveDate, u8), Vec<usize>> = HashMap::new();
        let mut by_week: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut by_class_week: HashMap<(usize, u32), Vec<usize>> = HashMap::new();

        for (class_index, class) in request.classes.iter().enumerate() {
            for &date in &dates {
                let dow = day_of_week(date);
                for period in TimeSlot::MIN_PERIOD..=TimeSlot::MAX_PERIOD {
                    let slot = TimeSlot::new(dow, period);
                    if class.weekly_schedule.is_conflict(&slot) {
                        continue;
                    }
                    let idx = keys.len();
                    keys.push(GridKey { class_index, date, period });
                    by_class.entry(class_index).or_default().push(idx);
                    by_date_period.entry((date, period)).or_default().push(idx);
                    let week = week_index(date, request.start_date);
                    by_week.entry(week).or_default().push(idx);
                    by_class_week.entry((class_index, week)).or_default().push(idx);
                }
            }

            if class.weekly_schedule.has_required_periods() {
                let reachable = by_class
                    .get(&class_index)
                    .map(|indices| {
                        indices
                            .iter()
                            .any(|&i| class.weekly_schedule.is_required(&keys[i].time_slot()))
                    })
                    .unwrap_or(false);
                if !reachable {
                    return Err(SolveError::InfeasibleGrid { class_id: class.id.clone() });
                }
            }
        }

        Ok(VariableGrid {
            classes: request.classes.clone(),
            dates,
            start_date: request.start_date,
            end_date: request.end_date,
            total_weeks,
            instructor_availability: request.instructor_availability.clone(),
            keys,
            by_class,
            by_date_period,
            by_week,
            by_class_week,
        })
    }

    pub fn class_by_id(&self, class_id: &str) -> Option<(usize, &Class)> {
        self.classes.iter().enumerate().find(|(_, c)| c.id == class_id)
    }

    pub fn indices_for_class(&self, class_index: usize) -> &[usize] {
        self.by_class.get(&class_index).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn indices_for_date_period(&self, date: NaiveDate, period: u8) -> &[usize] {
        self.by_date_period.get(&(date, period)).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn indices_for_week(&self, week: u32) -> &[usize] {
        self.by_week.get(&week).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn indices_for_class_week(&self, class_index: usize, week: u32) -> &[usize] {
        self.by_class_week.get(&(class_index, week)).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn weeks(&self) -> std::ops::Range<u32> {
        0..self.total_weeks
    }

    /// Count of weekdays present in the given week (used for the first-week minimum pro-ration).
    pub fn weekdays_in_week(&self, week: u32) -> u32 {
        self.dates.iter().filter(|d| week_index(**d, self.start_date) == week).count() as u32
    }

    pub fn is_instructor_unavailable(&self, date: NaiveDate, day_of_week: u8, period: u8) -> bool {
        self.instructor_availability.iter().any(|u| u.forbids(date, day_of_week, period))
    }
}

/// Ordered map from grid key to a stable variable id, used by both the CP-SAT driver (to look
/// up `BoolVar`s) and the GA chromosome decoder (to look up valid gene targets).
pub type GridIndex = IndexMap<GridKey, usize>;

pub fn index_grid(grid: &VariableGrid) -> GridIndex {
    grid.keys.iter().enumerate().map(|(i, k)| (*k, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_dao::model::class::{Class, WeeklySchedule};
    use scheduler_dao::model::constraints_config::GlobalConstraints;

    fn request_with_classes(classes: Vec<Class>) -> ScheduleRequest {
        ScheduleRequest {
            classes,
            instructor_availability: Vec::new(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
            constraints: GlobalConstraints {
                start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
                ..Default::default()
            },
            options: HashMap::new(),
        }
    }

    #[test]
    fn prunes_conflicts_and_builds_indices() {
        let mut schedule = WeeklySchedule::default();
        schedule.conflicts.push(TimeSlot::new(1, 1));
        let class = Class::new("c1", "Class 1", "3", schedule);
        let grid = VariableGrid::build(&request_with_classes(vec![class])).unwrap();
        assert_eq!(grid.total_weeks, 1);
        assert!(!grid.keys.iter().any(|k| k.day_of_week() == 1 && k.period == 1));
        assert_eq!(grid.keys.len(), 5 * 8 - 1);
    }

    #[test]
    fn infeasible_when_required_period_unreachable() {
        let mut schedule = WeeklySchedule::default();
        schedule.required_periods.push(TimeSlot::new(6, 1));
        let class = Class::new("c1", "Class 1", "3", schedule);
        let err = VariableGrid::build(&request_with_classes(vec![class])).unwrap_err();
        matches!(err, SolveError::InfeasibleGrid { .. });
    }
}
