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

//! Chromosome encoding for the genetic engine: one gene per (class, required-session) pair.
//! Sessions are a per-class-per-week count (`minPeriodsPerWeek` sessions per week, at least
//! one so every class always has a representative gene); decoding projects the chromosome down
//! to the canonical "one assignment per class" output shape, matching the CP-SAT encoding's
//! exactly-one semantics.

use crate::grid::{day_of_week, VariableGrid};
use chrono::{Days, NaiveDate};
use rand::Rng;
use scheduler_dao::model::assignment::Assignment;
use scheduler_dao::model::class::Class;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gene {
    pub class_index: usize,
    pub day_of_week: u8,
    pub period: u8,
    pub week: u32,
}

impl Gene {
    pub fn random(class_index: usize, total_weeks: u32, rng: &mut impl Rng) -> Self {
        Gene {
            class_index,
            day_of_week: rng.random_range(1..=5),
            period: rng.random_range(1..=8),
            week: if total_weeks == 0 { 0 } else { rng.random_range(0..total_weeks) },
        }
    }

    /// A gene differs from another if any of its four fields differs (used by the diversity
    /// metric's normalized Hamming distance).
    pub fn differs_from(&self, other: &Gene) -> bool {
        self.class_index != other.class_index || self.day_of_week != other.day_of_week || self.period != other.period || self.week != other.week
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chromosome {
    pub genes: Vec<Gene>,
}

/// Sessions-per-class: `minPeriodsPerWeek * totalWeeks`, floored at 1 so every class always
/// has at least one representative gene even under a zero minimum.
pub fn sessions_per_class(min_periods_per_week: u32, total_weeks: u32) -> usize {
    ((min_periods_per_week * total_weeks) as usize).max(1)
}

impl Chromosome {
    pub fn random(classes_len: usize, sessions: usize, total_weeks: u32, rng: &mut impl Rng) -> Self {
        let mut genes = Vec::with_capacity(classes_len * sessions);
        for class_index in 0..classes_len {
            for _ in 0..sessions {
                genes.push(Gene::random(class_index, total_weeks, rng));
            }
        }
        Chromosome { genes }
    }

    /// Encodes a canonical (one-per-class) assignment list into a one-gene-per-class
    /// chromosome. Paired with [`Chromosome::decode_canonical`] to satisfy the round-trip law:
    /// encoding then decoding reproduces the original assignment multiset.
    pub fn encode_from_assignments(assignments: &[Assignment], grid: &VariableGrid) -> Self {
        let mut genes = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let class_index = grid
                .classes
                .iter()
                .position(|c| c.id == assignment.class_id)
                .expect("assignment references a class present in the grid");
            let week = crate::grid::week_index(assignment.date, grid.start_date);
            genes.push(Gene {
                class_index,
                day_of_week: assignment.day_of_week,
                period: assignment.period,
                week,
            });
        }
        Chromosome { genes }
    }

    /// Maps a (week, day_of_week) pair back to the concrete calendar date in that 7-day window.
    /// Every 7-day window starting at `start_date + 7*week` contains each weekday exactly once,
    /// so this is an exact inverse of `week_index`/`day_of_week` for dates produced by them.
    pub fn date_for(start_date: NaiveDate, week: u32, dow: u8) -> NaiveDate {
        let week_start = start_date + Days::new(week as u64 * 7);
        for offset in 0..7u64 {
            let candidate = week_start + Days::new(offset);
            if day_of_week(candidate) == dow {
                return candidate;
            }
        }
        unreachable!("a 7-day window always contains every weekday exactly once")
    }

    /// Projects the chromosome to one [`Assignment`] per class: the first session gene that
    /// lands on a required slot (if the class has any), otherwise the first session gene in
    /// chromosome order.
    pub fn decode_canonical(&self, classes: &[Class], start_date: NaiveDate) -> Vec<Assignment> {
        let mut by_class: Vec<Vec<&Gene>> = vec![Vec::new(); classes.len()];
        for gene in &self.genes {
            if gene.class_index < classes.len() {
                by_class[gene.class_index].push(gene);
            }
        }
        let mut out = Vec::with_capacity(classes.len());
        for (class_index, class) in classes.iter().enumerate() {
            let genes = &by_class[class_index];
            if genes.is_empty() {
                continue;
            }
            let chosen = if class.weekly_schedule.has_required_periods() {
                genes
                    .iter()
                    .find(|g| {
                        class
                            .weekly_schedule
                            .is_required(&scheduler_dao::model::time_slot::TimeSlot::new(g.day_of_week, g.period))
                    })
                    .copied()
                    .unwrap_or(genes[0])
            } else {
                genes[0]
            };
            let date = Self::date_for(start_date, chosen.week, chosen.day_of_week);
            out.push(Assignment::new(class.id.clone(), date, chosen.day_of_week, chosen.period));
        }
        out
    }

    /// Per-(week,day) count <= maxClassesPerDay; per-week count <= maxClassesPerWeek; no
    /// triple-consecutive period within the same (week,day); and, when consecutive classes are
    /// disallowed, no adjacent pair either. Invalid chromosomes receive fitness `-inf`.
    pub fn is_valid(&self, max_classes_per_day: u32, max_classes_per_week: u32, allow_consecutive: bool) -> bool {
        use std::collections::HashMap;
        let mut per_week_day: HashMap<(u32, u8), Vec<u8>> = HashMap::new();
        let mut per_week: HashMap<u32, u32> = HashMap::new();
        for gene in &self.genes {
            per_week_day.entry((gene.week, gene.day_of_week)).or_default().push(gene.period);
            *per_week.entry(gene.week).or_insert(0) += 1;
        }
        for count in per_week.values() {
            if *count > max_classes_per_week {
                return false;
            }
        }
        for periods in per_week_day.values() {
            if periods.len() as u32 > max_classes_per_day {
                return false;
            }
            let mut sorted = periods.clone();
            sorted.sort_unstable();
            sorted.dedup();
            for w in sorted.windows(3) {
                if w[1] == w[0] + 1 && w[2] == w[1] + 1 {
                    return false;
                }
            }
            if !allow_consecutive {
                for w in sorted.windows(2) {
                    if w[1] == w[0] + 1 {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_dao::model::class::WeeklySchedule;
    use scheduler_dao::model::constraints_config::GlobalConstraints;
    use scheduler_dao::model::request::ScheduleRequest;
    use std::collections::HashMap;

    fn grid_for(classes: Vec<Class>) -> VariableGrid {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 21).unwrap();
        let request = ScheduleRequest {
            classes,
            instructor_availability: Vec::new(),
            start_date: start,
            end_date: end,
            constraints: GlobalConstraints { start_date: start, end_date: end, ..Default::default() },
            options: HashMap::new(),
        };
        VariableGrid::build(&request).unwrap()
    }

    #[test]
    fn encode_decode_round_trips() {
        let class = Class::new("c1", "Class 1", "3", WeeklySchedule::default());
        let grid = grid_for(vec![class]);
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let original = vec![Assignment::new("c1", date, 3, 4)];
        let chromosome = Chromosome::encode_from_assignments(&original, &grid);
        let decoded = chromosome.decode_canonical(&grid.classes, grid.start_date);
        assert_eq!(decoded, original);
    }

    #[test]
    fn invalid_on_triple_consecutive() {
        let chromosome = Chromosome {
            genes: vec![
                Gene { class_index: 0, day_of_week: 1, period: 1, week: 0 },
                Gene { class_index: 1, day_of_week: 1, period: 2, week: 0 },
                Gene { class_index: 2, day_of_week: 1, period: 3, week: 0 },
            ],
        };
        assert!(!chromosome.is_valid(10, 10, true));
    }

    #[test]
    fn valid_pair_when_consecutive_allowed() {
        let chromosome = Chromosome {
            genes: vec![
                Gene { class_index: 0, day_of_week: 1, period: 1, week: 0 },
                Gene { class_index: 1, day_of_week: 1, period: 2, week: 0 },
            ],
        };
        assert!(chromosome.is_valid(10, 10, true));
        assert!(!chromosome.is_valid(10, 10, false));
    }
}
