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

//! The weight-tuning meta-optimizer: a second-level GA whose chromosomes are candidate
//! [`ObjectiveWeights`] sets, scored by running the inner genetic backend to completion and
//! composing a quality score from the resulting schedule.

use crate::config::{GaConfig, SolverConfig, SolverType};
use crate::grid::VariableGrid;
use crate::scheduler::ga;
use crate::scheduler::parallel;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scheduler_dao::model::constraints_config::GlobalConstraints;
use scheduler_dao::weights::{BestMetaResult, ObjectiveWeights, WEIGHT_KEYS};
use std::collections::HashMap;

/// A candidate weight set under evaluation; keyed the same way as [`ObjectiveWeights::as_map`].
#[derive(Debug, Clone)]
pub struct WeightChromosome {
    pub values: HashMap<String, f64>,
}

impl WeightChromosome {
    pub fn from_weights(weights: &ObjectiveWeights) -> Self {
        WeightChromosome { values: weights.as_map() }
    }

    /// Converts a tuned chromosome back into an [`ObjectiveWeights`]. `required_periods` is
    /// never tuned (the required-slot constraint is already hard and its weight fixed) and
    /// is instead read back under the `preferred_periods` key, matching the original
    /// optimizer's key rename on output.
    pub fn to_weights(&self) -> ObjectiveWeights {
        let mut weights = ObjectiveWeights::default();
        for key in WEIGHT_KEYS {
            if *key == "required_periods" {
                continue;
            }
            if let Some(value) = self.values.get(*key) {
                let _ = weights.set(key, *value);
            }
        }
        if let Some(value) = self.values.get("required_periods") {
            let _ = weights.set("preferred_periods", *value);
        }
        weights
    }

    /// A perturbed copy: every weight scaled by a uniform factor in `[0.5, 2.0]`, sign
    /// preserved (a negative weight like `avoid_periods` stays negative).
    pub fn perturbed(base: &ObjectiveWeights, rng: &mut impl Rng) -> Self {
        let mut values = HashMap::new();
        for key in WEIGHT_KEYS {
            let original = base.get(key).unwrap();
            let factor = rng.random_range(0.5..=2.0);
            values.insert(key.to_string(), original * factor);
        }
        WeightChromosome { values }
    }
}

/// Scored evaluation of one weight chromosome.
pub struct Evaluation {
    pub chromosome: WeightChromosome,
    pub fitness: f64,
}

/// Per-day class-count variance over a decoded schedule (population variance, zero for an
/// empty or single-day schedule).
fn per_day_variance(assignments: &[scheduler_dao::model::assignment::Assignment]) -> f64 {
    let mut per_day: HashMap<chrono::NaiveDate, u32> = HashMap::new();
    for a in assignments {
        *per_day.entry(a.date).or_insert(0) += 1;
    }
    if per_day.is_empty() {
        return 0.0;
    }
    let mean = per_day.values().sum::<u32>() as f64 / per_day.len() as f64;
    per_day.values().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / per_day.len() as f64
}

/// Evaluates a weight chromosome by running the inner genetic backend to completion under
/// those weights and composing the §4.7 score from the resulting schedule:
/// `+0.01 * inner_best_fitness`, `+1000` when the decoded schedule carries zero constraint
/// violations (else `-500 * violation_count`), `-50 * variance` of per-day class counts, and
/// `+500 * (1 - generations_used/max_generations)` rewarding fast convergence. An inner solve
/// that errors outright scores `-10000`; one that returns an empty schedule scores `-1000`
/// before any of the above terms apply.
pub fn evaluate(
    chromosome: &WeightChromosome,
    grid: &VariableGrid,
    constraints_config: &GlobalConstraints,
    ga_config: &GaConfig,
    eval_time_limit_seconds: u64,
    seed: u64,
) -> Evaluation {
    let weights = chromosome.to_weights();
    let fitness = match ga::run(grid, constraints_config, &weights, ga_config, eval_time_limit_seconds, seed) {
        Ok(outcome) if outcome.assignments.is_empty() => -1000.0,
        Ok(outcome) => {
            let ctx = crate::scheduler::constraints::ValidationContext::from_grid(grid, constraints_config);
            let constraints = crate::scheduler::constraints::default_constraints();
            let violations = crate::scheduler::constraints::validate_all(&constraints, &outcome.assignments, &ctx);
            let violation_term = if violations.is_empty() { 1000.0 } else { -500.0 * violations.len() as f64 };
            let variance = per_day_variance(&outcome.assignments);
            let convergence_bonus = 500.0 * (1.0 - outcome.generations_used as f64 / ga_config.max_generations.max(1) as f64).max(0.0);
            0.01 * outcome.best_fitness + violation_term - 50.0 * variance + convergence_bonus
        }
        Err(_) => -10000.0,
    };
    Evaluation { chromosome: chromosome.clone(), fitness }
}

fn tournament(evaluations: &[Evaluation], rng: &mut impl Rng) -> &WeightChromosome {
    let mut best = rng.random_range(0..evaluations.len());
    for _ in 0..2 {
        let candidate = rng.random_range(0..evaluations.len());
        if evaluations[candidate].fitness > evaluations[best].fitness {
            best = candidate;
        }
    }
    &evaluations[best].chromosome
}

/// Per-key crossover: a 20% chance of averaging the two parents' values for each weight key,
/// otherwise inheriting one parent's value at random.
fn crossover(a: &WeightChromosome, b: &WeightChromosome, rng: &mut impl Rng) -> WeightChromosome {
    let mut values = HashMap::new();
    for key in WEIGHT_KEYS {
        let av = a.values.get(*key).copied().unwrap_or(0.0);
        let bv = b.values.get(*key).copied().unwrap_or(0.0);
        let value = if rng.random_bool(0.2) {
            (av + bv) / 2.0
        } else if rng.random_bool(0.5) {
            av
        } else {
            bv
        };
        values.insert(key.to_string(), value);
    }
    WeightChromosome { values }
}

/// Sign-preserving mutation: each weight independently scales by a uniform factor in
/// `[0.7, 1.3]` with probability `rate`.
fn mutate(chromosome: &mut WeightChromosome, rate: f64, rng: &mut impl Rng) {
    for key in WEIGHT_KEYS {
        if rng.random_bool(rate.clamp(0.0, 1.0)) {
            if let Some(v) = chromosome.values.get_mut(*key) {
                *v *= rng.random_range(0.7..=1.3);
            }
        }
    }
}

pub struct MetaOutcome {
    pub weights: ObjectiveWeights,
    pub fitness: f64,
    pub generations_used: u32,
}

/// Evolves a population of weight chromosomes against `grid`, seeding from the current
/// global weights plus uniform perturbations, and returns the best-scoring set found. If no
/// chromosome ever scores positive, falls back to the unperturbed default weights with a
/// nominal fitness of `0.1` (never `0.0`, so callers can tell "ran but found nothing better"
/// from "never ran").
pub fn run(grid: &VariableGrid, constraints_config: &GlobalConstraints, meta_config: &crate::config::MetaConfig, ga_config: &GaConfig, seed: u64) -> MetaOutcome {
    let base_weights = scheduler_dao::weights::read_weights();
    let recorded_best = scheduler_dao::weights::read_best_meta_result();
    if !SolverConfig::feature_enabled("ENABLE_WEIGHT_TUNING", true) {
        info!("meta: weight tuning disabled via ENABLE_WEIGHT_TUNING, returning current weights unchanged");
        return match recorded_best {
            Some(best) => MetaOutcome { weights: best.weights, fitness: best.fitness, generations_used: best.generations_used },
            None => MetaOutcome { weights: base_weights, fitness: 0.1, generations_used: 0 },
        };
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let mut population: Vec<WeightChromosome> = Vec::with_capacity(meta_config.population_size.max(1));
    population.push(WeightChromosome::from_weights(&base_weights));
    if let Some(best) = &recorded_best {
        population.push(WeightChromosome::from_weights(&best.weights));
    }
    while population.len() < meta_config.population_size.max(1) {
        population.push(WeightChromosome::perturbed(&base_weights, &mut rng));
    }

    let mut best: Option<Evaluation> = None;
    let mut generation = 0u32;

    for gen in 0..meta_config.generations.max(1) {
        generation = gen + 1;
        let evaluations: Vec<Evaluation> = parallel::scatter_gather(&population, meta_config.parallel_evaluation, |chromosome| {
            evaluate(chromosome, grid, constraints_config, ga_config, meta_config.eval_time_limit_seconds, seed.wrapping_add(gen as u64))
        })
        .into_iter()
        .flatten()
        .collect();

        if evaluations.is_empty() {
            break;
        }

        let champion = evaluations.iter().max_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(std::cmp::Ordering::Equal)).unwrap();
        if best.as_ref().map(|b| champion.fitness > b.fitness).unwrap_or(true) {
            best = Some(Evaluation { chromosome: champion.chromosome.clone(), fitness: champion.fitness });
        }
        info!("meta: generation {} best_fitness={:.1}", generation, best.as_ref().unwrap().fitness);

        let mut sorted = evaluations;
        sorted.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(std::cmp::Ordering::Equal));

        let mut next_population = vec![sorted[0].chromosome.clone()];
        while next_population.len() < meta_config.population_size.max(1) {
            if rng.random_bool(meta_config.crossover_rate.clamp(0.0, 1.0)) {
                let parent_a = tournament(&sorted, &mut rng);
                let parent_b = tournament(&sorted, &mut rng);
                let mut child = crossover(parent_a, parent_b, &mut rng);
                mutate(&mut child, meta_config.mutation_rate, &mut rng);
                next_population.push(child);
            } else {
                let parent = tournament(&sorted, &mut rng);
                let mut child = parent.clone();
                mutate(&mut child, meta_config.mutation_rate, &mut rng);
                next_population.push(child);
            }
        }
        population = next_population;
    }

    match best {
        Some(evaluation) if evaluation.fitness > 0.0 => {
            let weights = evaluation.chromosome.to_weights();
            scheduler_dao::weights::update_best_meta_result(BestMetaResult {
                weights: weights.clone(),
                fitness: evaluation.fitness,
                generations_used: generation,
            });
            MetaOutcome { weights, fitness: evaluation.fitness, generations_used: generation }
        }
        _ => match recorded_best {
            Some(best) => MetaOutcome { weights: best.weights, fitness: best.fitness, generations_used: generation },
            None => MetaOutcome { weights: base_weights, fitness: 0.1, generations_used: generation },
        },
    }
}

/// `or_tools`/`hybrid`/`meta` solver types make no sense for the inner per-chromosome
/// evaluation (re-tuning weights only changes the soft-objective landscape the genetic
/// backend searches); evaluation always forces [`SolverType::Genetic`] regardless of what
/// the caller's top-level [`SolverConfig`] requests.
pub fn force_genetic_solver_type(config: &mut SolverConfig) {
    config.solver_type = SolverType::Genetic;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetaConfig;
    use scheduler_dao::model::class::{Class, WeeklySchedule};
    use scheduler_dao::model::request::ScheduleRequest;
    use chrono::NaiveDate;

    fn simple_grid() -> (VariableGrid, GlobalConstraints) {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let class = Class::new("c1", "Class 1", "3", WeeklySchedule::default());
        let constraints_config = GlobalConstraints { start_date: start, end_date: end, max_classes_per_day: 1, max_classes_per_week: 1, min_periods_per_week: 1, ..Default::default() };
        let request = ScheduleRequest {
            classes: vec![class],
            instructor_availability: Vec::new(),
            start_date: start,
            end_date: end,
            constraints: constraints_config.clone(),
            options: HashMap::new(),
        };
        (VariableGrid::build(&request).unwrap(), constraints_config)
    }

    #[test]
    fn never_returns_zero_fitness() {
        parallel::set_test_mode(true);
        scheduler_dao::weights::reset_best_meta_result();
        let (grid, constraints_config) = simple_grid();
        let mut meta_config = MetaConfig::default();
        meta_config.population_size = 4;
        meta_config.generations = 2;
        meta_config.eval_time_limit_seconds = 2;
        let mut ga_config = GaConfig::default();
        ga_config.population_size = 6;
        ga_config.max_generations = 2;
        ga_config.parallel_fitness = false;
        let outcome = run(&grid, &constraints_config, &meta_config, &ga_config, 3);
        assert!(outcome.fitness > 0.0);
        let recorded = scheduler_dao::weights::read_best_meta_result();
        assert!(recorded.is_some(), "a positive-fitness run should update the global best-result singleton");
        assert_eq!(recorded.unwrap().fitness, outcome.fitness);
        scheduler_dao::weights::reset_best_meta_result();
        parallel::reset_test_flags();
    }

    #[test]
    fn required_periods_value_surfaces_as_preferred_periods_on_output() {
        let mut chromosome = WeightChromosome::from_weights(&ObjectiveWeights::default());
        chromosome.values.insert("required_periods".to_string(), 4242.0);
        let weights = chromosome.to_weights();
        assert_eq!(weights.preferred_periods, 4242.0);
        assert_eq!(weights.required_periods, ObjectiveWeights::default().required_periods);
    }

    #[test]
    fn unknown_key_in_chromosome_values_is_ignored() {
        let mut chromosome = WeightChromosome::from_weights(&ObjectiveWeights::default());
        chromosome.values.insert("not_a_real_weight".to_string(), 5.0);
        let weights = chromosome.to_weights();
        assert_eq!(weights.preferred_periods, ObjectiveWeights::default().preferred_periods);
    }
}
