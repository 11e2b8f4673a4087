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

//! The library's single public entry point: a request in, a response out. Everything else
//! (grid construction, solver dispatch, relaxation, validation) is an implementation detail
//! reached through here.

use crate::config::SolverConfig;
use crate::scheduler::unified::UnifiedSolver;
use scheduler_dao::error::SolveError;
use scheduler_dao::model::request::{ScheduleRequest, ScheduleResponse};

/// Builds a [`SolverConfig`] from `request.options`, then solves. This is the one call site
/// most callers need; anyone wanting the meta-optimizer's weight tuning instead of a single
/// solve should use [`crate::scheduler::meta::run`] directly against a [`crate::grid::VariableGrid`].
pub fn solve(request: &ScheduleRequest) -> Result<ScheduleResponse, SolveError> {
    let config = SolverConfig::from_options(&request.options)?;
    UnifiedSolver::solve(request, &config)
}

/// Solves with an explicit, already-validated configuration, bypassing `request.options`
/// parsing entirely. Used by callers (and the demo binary) that construct a `SolverConfig`
/// programmatically.
pub fn solve_with_config(request: &ScheduleRequest, config: &SolverConfig) -> Result<ScheduleResponse, SolveError> {
    UnifiedSolver::solve(request, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_dao::model::class::{Class, WeeklySchedule};
    use scheduler_dao::model::constraints_config::GlobalConstraints;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    #[test]
    fn solve_rejects_unrecognized_option() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let class = Class::new("c1", "Class 1", "3", WeeklySchedule::default());
        let mut options = HashMap::new();
        options.insert("not_an_option".to_string(), serde_json::Value::Bool(true));
        let request = ScheduleRequest {
            classes: vec![class],
            instructor_availability: Vec::new(),
            start_date: start,
            end_date: end,
            constraints: GlobalConstraints { start_date: start, end_date: end, ..Default::default() },
            options,
        };
        assert!(solve(&request).is_err());
    }
}
