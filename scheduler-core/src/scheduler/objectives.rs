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

//! The fixed, enumerated objective set contributed to the CP-SAT model's single linear
//! objective. Each variant builds a raw term sum (the per-variable formula from the objective
//! table) which the caller scales by the matching [`ObjectiveWeights`] field and adds into the
//! grand total, mirroring how the source multiplies `objective.weight * term` before summing.

use crate::grid::VariableGrid;
use crate::scheduler::constraints::ModelVars;
use cp_sat::builder::{BoolVar, CpModelBuilder, LinearExpr};
use scheduler_dao::weights::ObjectiveWeights;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveKind {
    RequiredPeriods,
    PreferredPeriods,
    AvoidPeriods,
    EarlierDates,
    DayUsage,
    FinalWeekCompression,
    DailyBalance,
    Distribution,
    GradeGrouping,
    ConsecutiveSoft,
}

impl ObjectiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectiveKind::RequiredPeriods => "required_periods",
            ObjectiveKind::PreferredPeriods => "preferred_periods",
            ObjectiveKind::AvoidPeriods => "avoid_periods",
            ObjectiveKind::EarlierDates => "earlier_dates",
            ObjectiveKind::DayUsage => "day_usage",
            ObjectiveKind::FinalWeekCompression => "final_week_compression",
            ObjectiveKind::DailyBalance => "daily_balance",
            ObjectiveKind::Distribution => "distribution",
            ObjectiveKind::GradeGrouping => "grade_grouping",
            ObjectiveKind::ConsecutiveSoft => "consecutive_soft",
        }
    }

    pub fn weight(&self, weights: &ObjectiveWeights) -> f64 {
        weights.get(self.name()).expect("objective name is one of the fixed weight keys")
    }
}

pub const ALL_OBJECTIVES: [ObjectiveKind; 10] = [
    ObjectiveKind::RequiredPeriods,
    ObjectiveKind::PreferredPeriods,
    ObjectiveKind::AvoidPeriods,
    ObjectiveKind::EarlierDates,
    ObjectiveKind::DayUsage,
    ObjectiveKind::FinalWeekCompression,
    ObjectiveKind::DailyBalance,
    ObjectiveKind::Distribution,
    ObjectiveKind::GradeGrouping,
    ObjectiveKind::ConsecutiveSoft,
];

/// Builds the whole weighted objective and installs `model.minimize(-objective)` (the crate's
/// CP-SAT binding only exposes minimization; negating turns it into a maximization).
pub fn install_objective(
    builder: &mut CpModelBuilder,
    grid: &VariableGrid,
    vars: &ModelVars,
    weights: &ObjectiveWeights,
    constraints_config: &scheduler_dao::model::constraints_config::GlobalConstraints,
    enable_distribution: bool,
    enable_grade_grouping: bool,
) {
    use scheduler_dao::model::constraints_config::ConsecutiveClassesRule;
    let mut total = LinearExpr::from(0);
    for kind in ALL_OBJECTIVES {
        if !enable_distribution && matches!(kind, ObjectiveKind::Distribution | ObjectiveKind::DailyBalance) {
            continue;
        }
        if !enable_grade_grouping && matches!(kind, ObjectiveKind::GradeGrouping) {
            continue;
        }
        // The hard variant enforces the cap structurally via the `ConsecutiveClasses`
        // constraint; folding the soft penalty in on top would double-count it.
        if matches!(kind, ObjectiveKind::ConsecutiveSoft) && constraints_config.consecutive_classes_rule != ConsecutiveClassesRule::Soft {
            continue;
        }
        let weight = kind.weight(weights);
        if weight == 0.0 {
            continue;
        }
        let term = raw_term(kind, builder, grid, vars);
        total = total + scale(term, weight);
    }
    let negated = LinearExpr::from(0) - total;
    builder.minimize(negated);
}

/// Scales a `LinearExpr` by a floating weight, rounding to the nearest integer coefficient the
/// way the source's `int(round(...))` CP-SAT term construction does.
fn scale(expr: LinearExpr, weight: f64) -> LinearExpr {
    let scaled = (weight * 100.0).round() as i64;
    // term is already integral (0/1 sums); multiply by the weight scaled by 100 and divide the
    // grand total's interpretation accordingly by treating scaled as the true coefficient.
    expr * scaled / 100
}

fn raw_term(kind: ObjectiveKind, builder: &mut CpModelBuilder, grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    match kind {
        ObjectiveKind::RequiredPeriods => indicator_sum(grid, vars, |g, key| g.classes[key.class_index].weekly_schedule.is_required(&key.time_slot())),
        ObjectiveKind::PreferredPeriods => weighted_indicator_sum(builder, grid, vars, |g, key| {
            let class = &g.classes[key.class_index];
            if class.weekly_schedule.is_preferred(&key.time_slot()) {
                Some(class.weekly_schedule.preference_weight)
            } else {
                None
            }
        }),
        ObjectiveKind::AvoidPeriods => weighted_indicator_sum(builder, grid, vars, |g, key| {
            let class = &g.classes[key.class_index];
            if class.weekly_schedule.is_avoided(&key.time_slot()) {
                Some(class.weekly_schedule.avoidance_weight)
            } else {
                None
            }
        }),
        ObjectiveKind::EarlierDates => earlier_dates_term(builder, grid, vars),
        ObjectiveKind::DayUsage => day_usage_term(builder, grid, vars),
        ObjectiveKind::FinalWeekCompression => final_week_compression_term(builder, grid, vars),
        ObjectiveKind::DailyBalance => daily_balance_term(builder, grid, vars),
        ObjectiveKind::Distribution => distribution_term(builder, grid, vars),
        ObjectiveKind::GradeGrouping => grade_grouping_term(builder, grid, vars),
        ObjectiveKind::ConsecutiveSoft => consecutive_soft_term(grid, vars),
    }
}

fn indicator_sum(grid: &VariableGrid, vars: &ModelVars, predicate: impl Fn(&VariableGrid, &crate::grid::GridKey) -> bool) -> LinearExpr {
    grid.keys
        .iter()
        .filter(|k| predicate(grid, k))
        .filter_map(|k| vars.get(k).map(|v| (1i64, v.clone())))
        .collect::<Vec<(i64, BoolVar)>>()
        .into_iter()
        .collect()
}

/// Like `indicator_sum`, but each matching variable's coefficient is `round(weight * 100)` so
/// the class-level `preference_weight`/`avoidance_weight` scalars survive integer rounding.
fn weighted_indicator_sum(
    _builder: &mut CpModelBuilder,
    grid: &VariableGrid,
    vars: &ModelVars,
    weight_of: impl Fn(&VariableGrid, &crate::grid::GridKey) -> Option<f64>,
) -> LinearExpr {
    let terms: Vec<(i64, BoolVar)> = grid
        .keys
        .iter()
        .filter_map(|k| weight_of(grid, k).map(|w| (w, k)))
        .filter_map(|(w, k)| vars.get(k).map(|v| ((w * 100.0).round() as i64, v.clone())))
        .collect();
    let expr: LinearExpr = terms.into_iter().collect();
    expr / 100
}

fn earlier_dates_term(_builder: &mut CpModelBuilder, grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    let terms: Vec<(i64, BoolVar)> = grid
        .keys
        .iter()
        .filter_map(|k| {
            let days_from_start = (k.date - grid.start_date).num_days().max(0);
            // Normalized so that multiplying by `weights.earlier_dates` reproduces
            // `10 - 0.1 * days_from_start` at the default weight of 10.
            let raw = (1.0 - 0.01 * days_from_start as f64).max(-1.0);
            vars.get(k).map(|v| ((raw * 100.0).round() as i64, v.clone()))
        })
        .collect();
    let expr: LinearExpr = terms.into_iter().collect();
    expr / 100
}

/// +2000 scaled: for each non-final week, a penalty (-1000 raw, pre-weight) when a weekday has
/// zero classes. Modeled with an auxiliary "day used" bool per (week, weekday).
fn day_usage_term(builder: &mut CpModelBuilder, grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    let last_week = grid.total_weeks.saturating_sub(1);
    let mut total = LinearExpr::from(0);
    for &date in &grid.dates {
        let week = crate::grid::week_index(date, grid.start_date);
        if week == last_week {
            continue;
        }
        let mut indices = Vec::new();
        for period in 1..=8u8 {
            indices.extend_from_slice(grid.indices_for_date_period(date, period));
        }
        if indices.is_empty() {
            continue;
        }
        let day_sum = indices
            .iter()
            .filter_map(|&i| vars.get(&grid.keys[i]).map(|v| (1i64, v.clone())))
            .collect::<Vec<(i64, BoolVar)>>()
            .into_iter()
            .collect::<LinearExpr>();
        let used = builder.new_bool_var();
        // used == 0 implies day_sum == 0 (no classes that day): day_sum <= BIG * used.
        let big = indices.len() as i64;
        builder.add_le(day_sum, LinearExpr::from(used.clone()) * big);
        // Penalize -1000 when the day is unused, i.e. term = -1000 * (1 - used) = 1000*used - 1000.
        total = total + LinearExpr::from(used) * 1000 - 1000;
    }
    total
}

/// In the last week, -200*(day_index+1) per class, plus -500 for "gap" days (a used day
/// preceded by an unused one within the last week).
fn final_week_compression_term(builder: &mut CpModelBuilder, grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    let last_week = grid.total_weeks.saturating_sub(1);
    let last_week_dates: Vec<chrono::NaiveDate> = grid
        .dates
        .iter()
        .copied()
        .filter(|d| crate::grid::week_index(*d, grid.start_date) == last_week)
        .collect();
    let mut total = LinearExpr::from(0);
    let mut used_vars: Vec<BoolVar> = Vec::new();
    for (day_index, &date) in last_week_dates.iter().enumerate() {
        let mut indices = Vec::new();
        for period in 1..=8u8 {
            indices.extend_from_slice(grid.indices_for_date_period(date, period));
        }
        let day_sum: LinearExpr = indices
            .iter()
            .filter_map(|&i| vars.get(&grid.keys[i]).map(|v| (1i64, v.clone())))
            .collect::<Vec<(i64, BoolVar)>>()
            .into_iter()
            .collect();
        total = total + day_sum.clone() * (-200 * (day_index as i64 + 1));

        let used = builder.new_bool_var();
        let big = indices.len().max(1) as i64;
        builder.add_le(day_sum, LinearExpr::from(used.clone()) * big);
        used_vars.push(used);
    }
    for w in used_vars.windows(2) {
        // Gap day: previous day unused (prev==0) and this day used (cur==1).
        let gap = builder.new_bool_var();
        builder.add_le(LinearExpr::from(gap.clone()), LinearExpr::from(w[1].clone()));
        builder.add_le(
            LinearExpr::from(gap.clone()),
            LinearExpr::from(1) - LinearExpr::from(w[0].clone()),
        );
        total = total + LinearExpr::from(gap) * (-500);
    }
    total
}

/// For each pair of used days within a non-final week, -100*|count_i - count_j|.
fn daily_balance_term(builder: &mut CpModelBuilder, grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    let last_week = grid.total_weeks.saturating_sub(1);
    let mut total = LinearExpr::from(0);
    for week in grid.weeks() {
        if week == last_week {
            continue;
        }
        let week_dates: Vec<chrono::NaiveDate> = grid
            .dates
            .iter()
            .copied()
            .filter(|d| crate::grid::week_index(*d, grid.start_date) == week)
            .collect();
        let counts: Vec<LinearExpr> = week_dates
            .iter()
            .map(|&date| {
                let mut indices = Vec::new();
                for period in 1..=8u8 {
                    indices.extend_from_slice(grid.indices_for_date_period(date, period));
                }
                indices
                    .iter()
                    .filter_map(|&i| vars.get(&grid.keys[i]).map(|v| (1i64, v.clone())))
                    .collect::<Vec<(i64, BoolVar)>>()
                    .into_iter()
                    .collect()
            })
            .collect();
        for i in 0..counts.len() {
            for j in (i + 1)..counts.len() {
                total = total + abs_penalty(builder, counts[i].clone() - counts[j].clone(), 100);
            }
        }
    }
    total
}

/// Per week: -750*|sum*100 - target_per_week|, target = total_classes*100/total_weeks; plus
/// per-date per-period pairwise -50*|diff|.
fn distribution_term(builder: &mut CpModelBuilder, grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    let mut total = LinearExpr::from(0);
    if grid.total_weeks == 0 {
        return total;
    }
    let total_classes = grid.classes.len() as i64;
    let target_per_week = total_classes * 100 / grid.total_weeks as i64;

    for week in grid.weeks() {
        let indices = grid.indices_for_week(week);
        let week_sum: LinearExpr = indices
            .iter()
            .filter_map(|&i| vars.get(&grid.keys[i]).map(|v| (100i64, v.clone())))
            .collect::<Vec<(i64, BoolVar)>>()
            .into_iter()
            .collect();
        let deviation = week_sum - target_per_week;
        total = total + abs_penalty(builder, deviation, 750) / 100;
    }

    for &date in &grid.dates {
        let period_sums: Vec<LinearExpr> = (1..=8u8)
            .filter_map(|period| {
                let indices = grid.indices_for_date_period(date, period);
                if indices.is_empty() {
                    return None;
                }
                Some(
                    indices
                        .iter()
                        .filter_map(|&i| vars.get(&grid.keys[i]).map(|v| (1i64, v.clone())))
                        .collect::<Vec<(i64, BoolVar)>>()
                        .into_iter()
                        .collect(),
                )
            })
            .collect();
        for i in 0..period_sums.len() {
            for j in (i + 1)..period_sums.len() {
                total = total + abs_penalty(builder, period_sums[i].clone() - period_sums[j].clone(), 50);
            }
        }
    }
    total
}

/// For each pair of adjacent-period slots both selected: +gradeSimilarity*100, similarity per
/// the tabled grade-group distance map.
fn grade_grouping_term(builder: &mut CpModelBuilder, grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    let mut total = LinearExpr::from(0);
    for &date in &grid.dates {
        for period in 1..=7u8 {
            let left = grid.indices_for_date_period(date, period);
            let right = grid.indices_for_date_period(date, period + 1);
            for &li in left {
                for &ri in right {
                    let lk = grid.keys[li];
                    let rk = grid.keys[ri];
                    if lk.class_index == rk.class_index {
                        continue;
                    }
                    let similarity = grade_similarity(
                        grid.classes[lk.class_index].effective_grade_group(),
                        grid.classes[rk.class_index].effective_grade_group(),
                    );
                    if similarity == 0.0 {
                        continue;
                    }
                    if let (Some(lv), Some(rv)) = (vars.get(&lk), vars.get(&rk)) {
                        let both = builder.new_bool_var();
                        builder.add_le(LinearExpr::from(both.clone()), LinearExpr::from(lv.clone()));
                        builder.add_le(LinearExpr::from(both.clone()), LinearExpr::from(rv.clone()));
                        builder.add_ge(
                            LinearExpr::from(both.clone()),
                            LinearExpr::from(lv.clone()) + LinearExpr::from(rv.clone()) - 1,
                        );
                        let coeff = (similarity * 100.0).round() as i64;
                        total = total + LinearExpr::from(both) * coeff;
                    }
                }
            }
        }
    }
    total / 100
}

fn grade_similarity(a: u8, b: u8) -> f64 {
    match (a as i16 - b as i16).abs() {
        0 => 1.0,
        1 => 0.8,
        2 => 0.4,
        _ => 0.0,
    }
}

/// -100 per adjacent-pair selected. Only reached when the rule is soft; `install_objective`
/// skips this term entirely under the hard rule, where the cap is enforced structurally by
/// the `ConsecutiveClasses` constraint instead.
fn consecutive_soft_term(grid: &VariableGrid, vars: &ModelVars) -> LinearExpr {
    let mut total = LinearExpr::from(0);
    for &date in &grid.dates {
        for period in 1..=7u8 {
            let left = grid.indices_for_date_period(date, period);
            let right = grid.indices_for_date_period(date, period + 1);
            for &li in left {
                for &ri in right {
                    if let (Some(lv), Some(rv)) = (vars.get(&grid.keys[li]), vars.get(&grid.keys[ri])) {
                        let pair: LinearExpr = vec![(1i64, lv.clone()), (1i64, rv.clone())].into_iter().collect();
                        total = total + pair * (-50);
                    }
                }
            }
        }
    }
    total
}

/// Builds `abs_var >= expr` and `abs_var >= -expr`, returning `-scale * abs_var` (the penalty).
fn abs_penalty(builder: &mut CpModelBuilder, expr: LinearExpr, scale: i64) -> LinearExpr {
    let domain_bound = 100_000i64;
    let abs_var = builder.new_int_var(vec![(0, domain_bound)]);
    builder.add_ge(abs_var.clone(), expr.clone());
    let negated = LinearExpr::from(0) - expr;
    builder.add_ge(abs_var.clone(), negated);
    LinearExpr::from(abs_var) * (-scale)
}

#[allow(dead_code)]
pub type WeightMap = HashMap<String, f64>;
