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

//! Demo CLI: builds a small multi-week scheduling request, runs it through the hybrid solver,
//! and prints the resulting assignments, solver metadata and any validator violations.

use chrono::NaiveDate;
use colored::Colorize;
use log::LevelFilter;
use prettytable::{format, row, Table};
use scheduler_core::config::SolverConfig;
use scheduler_dao::model::class::{Class, WeeklySchedule};
use scheduler_dao::model::constraints_config::{ConsecutiveClassesRule, GlobalConstraints};
use scheduler_dao::model::request::ScheduleRequest;
use scheduler_dao::model::time_slot::TimeSlot;
use scheduler_dao::model::violation::Severity;
use std::collections::HashMap;

fn demo_request() -> ScheduleRequest {
    let start_date = NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date");
    let end_date = NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date");

    let mut art = WeeklySchedule::default();
    art.preferred_periods.push(TimeSlot::new(1, 2));
    art.preference_weight = 1.0;

    let mut music = WeeklySchedule::default();
    music.required_periods.push(TimeSlot::new(2, 3));

    let mut gym = WeeklySchedule::default();
    gym.avoid_periods.push(TimeSlot::new(5, 8));
    gym.avoidance_weight = 1.0;
    gym.conflicts.push(TimeSlot::new(3, 1));

    let classes = vec![
        Class::new("art-k", "Art", "K", art),
        Class::new("music-3", "Music", "3", music),
        Class::new("gym-1", "Gym", "1", gym),
        Class::new("science-5", "Science", "5", WeeklySchedule::default()),
    ];

    ScheduleRequest {
        classes,
        instructor_availability: Vec::new(),
        start_date,
        end_date,
        constraints: GlobalConstraints {
            max_classes_per_day: 3,
            max_classes_per_week: 4,
            min_periods_per_week: 1,
            max_consecutive_classes: 2,
            consecutive_classes_rule: ConsecutiveClassesRule::Soft,
            allow_consecutive_classes: true,
            required_break_periods: Default::default(),
            start_date,
            end_date,
        },
        options: HashMap::new(),
    }
}

fn assignments_table(response: &scheduler_dao::model::request::ScheduleResponse) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.add_row(row![buFc->"Class", buFc->"Date", buFc->"Day", buFc->"Period"]);
    for assignment in &response.assignments {
        table.add_row(row![
            assignment.name,
            assignment.date,
            assignment.time_slot.day_of_week,
            assignment.time_slot.period,
        ]);
    }
    table
}

fn print_violations(violations: &[scheduler_dao::model::violation::ConstraintViolation]) {
    if violations.is_empty() {
        println!("{}", "no validator violations".green());
        return;
    }
    for violation in violations {
        let label = format!("[{:?}] {}: {}", violation.severity, violation.constraint_name, violation.message);
        let colored = match violation.severity {
            Severity::Critical | Severity::Error => label.red().bold(),
            Severity::Warning => label.yellow(),
            Severity::Info => label.normal(),
        };
        println!("{colored}");
    }
}

fn main() {
    env_logger::Builder::new()
        .filter(None, LevelFilter::Info)
        .filter(Some("scheduler_core::scheduler::ga"), LevelFilter::Debug)
        .init();

    let request = demo_request();
    let mut config = SolverConfig::default();
    config.timeout_seconds = 10;
    config.ga.population_size = 40;
    config.ga.max_generations = 30;

    match scheduler_core::solve_with_config(&request, &config) {
        Ok(response) => {
            println!("{}", "schedule".bold());
            assignments_table(&response).printstd();

            println!();
            println!(
                "solver={} score={} gap={:.4} duration_ms={}",
                response.metadata.solver.blue().bold(),
                response.metadata.score,
                response.metadata.gap,
                response.metadata.duration_ms
            );
            if let Some(level) = response.metadata.relaxation_level {
                println!("relaxation_level={level}");
            }

            println!();
            print_violations(&response.violations);
        }
        Err(err) => {
            eprintln!("{}", format!("solve failed: {err}").red().bold());
        }
    }
}
