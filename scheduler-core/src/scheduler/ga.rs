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

//! The genetic-algorithm engine: chromosome fitness, four crossover operators with adaptive
//! selection, mutation, a fixed-size population manager, and the adaptive mutation/crossover
//! controller.

use crate::config::GaConfig;
use crate::grid::VariableGrid;
use crate::scheduler::chromosome::{sessions_per_class, Chromosome, Gene};
use crate::scheduler::parallel;
use auto_bench_fct::auto_bench_fct_hy;
use log::info;
use rand::Rng;
use scheduler_dao::model::assignment::Assignment;
use scheduler_dao::model::constraints_config::GlobalConstraints;
use scheduler_dao::model::request::SolveMetadata;
use scheduler_dao::model::time_slot::TimeSlot;
use scheduler_dao::weights::ObjectiveWeights;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Higher is better; an invalid chromosome scores negative infinity.
#[auto_bench_fct_hy]
pub fn fitness(chromosome: &Chromosome, grid: &VariableGrid, constraints_config: &GlobalConstraints, weights: &ObjectiveWeights) -> f64 {
    if !chromosome.is_valid(constraints_config.max_classes_per_day, constraints_config.max_classes_per_week, constraints_config.allow_consecutive_classes) {
        return f64::NEG_INFINITY;
    }
    let total_weeks = grid.total_weeks.max(1);
    let mut score = 0.0f64;

    for gene in &chromosome.genes {
        let class = &grid.classes[gene.class_index];
        let slot = TimeSlot::new(gene.day_of_week, gene.period);
        if class.weekly_schedule.is_conflict(&slot) {
            score -= 10000.0;
        }
        if class.weekly_schedule.is_preferred(&slot) {
            score += weights.preferred_periods * class.weekly_schedule.preference_weight;
        }
        if class.weekly_schedule.is_avoided(&slot) {
            score += weights.avoid_periods * class.weekly_schedule.avoidance_weight;
        }
        score += weights.earlier_dates * (total_weeks - gene.week.min(total_weeks)) as f64 / total_weeks as f64;
    }

    let mut per_week: HashMap<u32, u32> = HashMap::new();
    for gene in &chromosome.genes {
        *per_week.entry(gene.week).or_insert(0) += 1;
    }
    if !per_week.is_empty() {
        let mean = per_week.values().sum::<u32>() as f64 / per_week.len() as f64;
        let variance = per_week.values().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / per_week.len() as f64;
        score -= weights.distribution * variance;
    }

    let mut per_week_day: HashMap<(u32, u8), Vec<u8>> = HashMap::new();
    for gene in &chromosome.genes {
        per_week_day.entry((gene.week, gene.day_of_week)).or_default().push(gene.period);
    }
    for periods in per_week_day.values() {
        for run in run_lengths(periods) {
            if run > constraints_config.max_consecutive_classes {
                score -= 500.0 * (run - constraints_config.max_consecutive_classes) as f64;
            }
        }
    }

    score
}

fn run_lengths(periods: &[u8]) -> Vec<u32> {
    let mut sorted = periods.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut runs = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1] == sorted[j] + 1 {
            j += 1;
        }
        runs.push((j - i + 1) as u32);
        i = j + 1;
    }
    runs
}

/// Average pairwise normalized Hamming distance over genes (a gene counts as "different" if
/// any of its four fields differs).
pub fn diversity(population: &[Chromosome]) -> f64 {
    if population.len() < 2 {
        return 0.0;
    }
    let gene_count = population[0].genes.len().max(1);
    let mut total = 0.0;
    let mut pairs = 0u64;
    for i in 0..population.len() {
        for j in (i + 1)..population.len() {
            let differing = population[i]
                .genes
                .iter()
                .zip(population[j].genes.iter())
                .filter(|(a, b)| a.differs_from(b))
                .count();
            total += differing as f64 / gene_count as f64;
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossoverOp {
    SinglePoint,
    TwoPoint,
    Uniform,
    OrderPreserving,
}

pub const ALL_CROSSOVER_OPS: [CrossoverOp; 4] = [CrossoverOp::SinglePoint, CrossoverOp::TwoPoint, CrossoverOp::Uniform, CrossoverOp::OrderPreserving];

impl CrossoverOp {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "single_point" => Some(CrossoverOp::SinglePoint),
            "two_point" => Some(CrossoverOp::TwoPoint),
            "uniform" => Some(CrossoverOp::Uniform),
            "order_preserving" => Some(CrossoverOp::OrderPreserving),
            _ => None,
        }
    }
}

/// The operator pool a single GA run draws from: every recognized tag in `GA_CROSSOVER_METHODS`
/// (§6), or all four operators when the variable is unset or names nothing recognized.
pub fn allowed_crossover_ops() -> Vec<CrossoverOp> {
    match crate::config::SolverConfig::crossover_methods_from_env() {
        Some(tags) => {
            let parsed: Vec<CrossoverOp> = tags.iter().filter_map(|t| CrossoverOp::from_tag(t)).collect();
            if parsed.is_empty() {
                ALL_CROSSOVER_OPS.to_vec()
            } else {
                parsed
            }
        }
        None => ALL_CROSSOVER_OPS.to_vec(),
    }
}

/// `auto` selection: short chromosomes cross at a single point; once a per-day cap is in
/// effect, the quota-preserving splice keeps per-class session counts balanced; otherwise
/// fall back to uniform. The pick is snapped to the closest allowed operator when the
/// natural choice has been excluded via `GA_CROSSOVER_METHODS`.
pub fn select_operator_auto(chromosome_len: usize, max_classes_per_day: u32, allowed: &[CrossoverOp]) -> CrossoverOp {
    let preferred = if chromosome_len < 20 {
        CrossoverOp::SinglePoint
    } else if max_classes_per_day > 0 {
        CrossoverOp::OrderPreserving
    } else {
        CrossoverOp::Uniform
    };
    if allowed.contains(&preferred) {
        preferred
    } else {
        allowed.first().copied().unwrap_or(CrossoverOp::Uniform)
    }
}

pub fn select_operator_roulette(weights: &HashMap<CrossoverOp, f64>, allowed: &[CrossoverOp], rng: &mut impl Rng) -> CrossoverOp {
    let pool = if allowed.is_empty() { &ALL_CROSSOVER_OPS[..] } else { allowed };
    let total: f64 = pool.iter().map(|op| weights.get(op).copied().unwrap_or(1.0)).sum();
    let mut pick = rng.random_range(0.0..total.max(f64::MIN_POSITIVE));
    for &op in pool {
        let w = weights.get(&op).copied().unwrap_or(1.0);
        if pick < w {
            return op;
        }
        pick -= w;
    }
    pool[pool.len() - 1]
}

/// Crosses two equal-length parents with the given operator, producing two children.
pub fn crossover(op: CrossoverOp, a: &Chromosome, b: &Chromosome, rng: &mut impl Rng) -> (Chromosome, Chromosome) {
    assert_eq!(a.genes.len(), b.genes.len(), "crossover requires parents with equal gene count");
    match op {
        CrossoverOp::SinglePoint => {
            let len = a.genes.len();
            if len < 2 {
                return (a.clone(), b.clone());
            }
            let point = rng.random_range(1..len);
            let child1 = Chromosome { genes: [&a.genes[..point], &b.genes[point..]].concat() };
            let child2 = Chromosome { genes: [&b.genes[..point], &a.genes[point..]].concat() };
            (child1, child2)
        }
        CrossoverOp::TwoPoint => {
            let len = a.genes.len();
            if len < 3 {
                return crossover(CrossoverOp::SinglePoint, a, b, rng);
            }
            let mut p1 = rng.random_range(1..len);
            let mut p2 = rng.random_range(1..len);
            if p1 > p2 {
                std::mem::swap(&mut p1, &mut p2);
            }
            if p1 == p2 {
                p2 = (p1 + 1).min(len);
            }
            let mut genes1 = a.genes[..p1].to_vec();
            genes1.extend_from_slice(&b.genes[p1..p2]);
            genes1.extend_from_slice(&a.genes[p2..]);
            let mut genes2 = b.genes[..p1].to_vec();
            genes2.extend_from_slice(&a.genes[p1..p2]);
            genes2.extend_from_slice(&b.genes[p2..]);
            (Chromosome { genes: genes1 }, Chromosome { genes: genes2 })
        }
        CrossoverOp::Uniform => {
            let mut genes1 = Vec::with_capacity(a.genes.len());
            let mut genes2 = Vec::with_capacity(a.genes.len());
            for (ga, gb) in a.genes.iter().zip(b.genes.iter()) {
                if rng.random_bool(0.5) {
                    genes1.push(*ga);
                    genes2.push(*gb);
                } else {
                    genes1.push(*gb);
                    genes2.push(*ga);
                }
            }
            (Chromosome { genes: genes1 }, Chromosome { genes: genes2 })
        }
        CrossoverOp::OrderPreserving => (order_preserving_splice(a, b, rng), order_preserving_splice(b, a, rng)),
    }
}

/// Splices a contiguous segment from `primary`, then fills the remaining positions with genes
/// from `secondary` in their relative order, skipping a `secondary` gene once `primary`'s
/// per-class session quota has already been met by the segment or prior fills.
fn order_preserving_splice(primary: &Chromosome, secondary: &Chromosome, rng: &mut impl Rng) -> Chromosome {
    let len = primary.genes.len();
    if len == 0 {
        return primary.clone();
    }
    let mut start = rng.random_range(0..len);
    let mut end = rng.random_range(0..len);
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    end = (end + 1).min(len);

    let mut child: Vec<Option<Gene>> = vec![None; len];
    let mut remaining: HashMap<usize, i64> = HashMap::new();
    for gene in &primary.genes {
        *remaining.entry(gene.class_index).or_insert(0) += 1;
    }
    for i in start..end {
        child[i] = Some(primary.genes[i]);
        *remaining.get_mut(&primary.genes[i].class_index).unwrap() -= 1;
    }

    let fill_positions: Vec<usize> = (end..len).chain(0..start).collect();
    let mut secondary_iter = secondary.genes.iter();
    for pos in fill_positions {
        loop {
            match secondary_iter.next() {
                Some(gene) => {
                    let slot = remaining.entry(gene.class_index).or_insert(0);
                    if *slot > 0 {
                        child[pos] = Some(*gene);
                        *slot -= 1;
                        break;
                    }
                }
                None => break,
            }
        }
    }

    let genes = child
        .into_iter()
        .enumerate()
        .map(|(i, g)| g.unwrap_or(primary.genes[i]))
        .collect();
    Chromosome { genes }
}

/// Each gene independently mutates with probability `rate`, replaced by a fresh random gene
/// for the same class.
pub fn mutate(chromosome: &mut Chromosome, rate: f64, total_weeks: u32, rng: &mut impl Rng) {
    for gene in chromosome.genes.iter_mut() {
        if rng.random_bool(rate.clamp(0.0, 1.0)) {
            *gene = Gene::random(gene.class_index, total_weeks, rng);
        }
    }
}

fn tournament<'a>(population: &'a [Chromosome], fitnesses: &[f64], size: usize, rng: &mut impl Rng) -> &'a Chromosome {
    let mut best_idx = rng.random_range(0..population.len());
    for _ in 1..size {
        let candidate = rng.random_range(0..population.len());
        if fitnesses[candidate] > fitnesses[best_idx] {
            best_idx = candidate;
        }
    }
    &population[best_idx]
}

/// Rolling-window diversity/fitness history and the rate-adjustment rules of §4.5.
pub struct AdaptiveController {
    diversity_history: VecDeque<f64>,
    fitness_history: VecDeque<f64>,
    window: usize,
}

impl AdaptiveController {
    pub fn new(window: usize) -> Self {
        AdaptiveController {
            diversity_history: VecDeque::with_capacity(window),
            fitness_history: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn record(&mut self, diversity: f64, best_fitness: f64) {
        self.diversity_history.push_back(diversity);
        if self.diversity_history.len() > self.window {
            self.diversity_history.pop_front();
        }
        self.fitness_history.push_back(best_fitness);
        if self.fitness_history.len() > self.window {
            self.fitness_history.pop_front();
        }
    }

    /// Normalized linear-regression slope of the diversity window, clamped to `[-1, 1]`.
    pub fn diversity_trend(&self) -> f64 {
        normalized_slope(&self.diversity_history)
    }

    /// Average of per-step relative fitness improvements, clamped to `[0, 1]`.
    pub fn convergence_rate(&self) -> f64 {
        if self.fitness_history.len() < 2 {
            return 0.0;
        }
        let values: Vec<f64> = self.fitness_history.iter().copied().filter(|v| v.is_finite()).collect();
        if values.len() < 2 {
            return 0.0;
        }
        let mut improvements = Vec::new();
        for w in values.windows(2) {
            let (prev, cur) = (w[0], w[1]);
            let denom = prev.abs().max(1.0);
            improvements.push(((cur - prev) / denom).max(0.0));
        }
        (improvements.iter().sum::<f64>() / improvements.len() as f64).clamp(0.0, 1.0)
    }

    /// Next mutation rate: raised toward `max` proportionally to how far diversity has fallen
    /// below `threshold`, with an extra boost when the diversity trend is strongly negative;
    /// otherwise decays toward `base`. A monotone-decreasing diversity history therefore never
    /// produces a lower rate than the previous call.
    pub fn next_mutation_rate(&self, config: &GaConfig, diversity: f64, current_rate: f64) -> f64 {
        let base = GaConfig::default().mutation_rate;
        let min_rate = 0.01;
        let max_rate = 0.8;
        let threshold = config.diversity_threshold.max(1e-9);
        let mut target = if diversity < threshold {
            base + ((threshold - diversity) / threshold) * config.adaptation_strength * (max_rate - base)
        } else {
            base + (current_rate - base) * 0.5
        };
        let trend = self.diversity_trend();
        if trend < -0.2 {
            target += (-trend - 0.2) * config.adaptation_strength * (max_rate - base) * 0.5;
        }
        target.clamp(min_rate, max_rate)
    }

    pub fn next_crossover_rate(&self, config: &GaConfig, diversity: f64, current_rate: f64) -> f64 {
        let base = GaConfig::default().crossover_rate;
        let min_rate = 0.3;
        let max_rate = 0.95;
        let threshold = config.diversity_threshold.max(1e-9);
        let convergence = self.convergence_rate();
        let target = if convergence > 0.5 && diversity > threshold {
            current_rate + (max_rate - current_rate) * config.adaptation_strength
        } else if convergence < 0.2 && diversity < threshold {
            current_rate - (current_rate - min_rate) * config.adaptation_strength
        } else {
            base + (current_rate - base) * 0.5
        };
        target.clamp(min_rate, max_rate)
    }
}

fn normalized_slope(history: &VecDeque<f64>) -> f64 {
    let n = history.len();
    if n < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = history.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (x, y) in xs.iter().zip(history.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
    }
    if var_x == 0.0 {
        return 0.0;
    }
    let slope = cov / var_x;
    let spread = history.iter().cloned().fold(f64::MIN, f64::max) - history.iter().cloned().fold(f64::MAX, f64::min);
    let spread = spread.abs().max(1e-9);
    (slope / spread).clamp(-1.0, 1.0)
}

/// Tracks per-operator (improved-offspring count, use count) over a 5-generation window and
/// rederives roulette weights from the ratio, clamped to `[0.1, 5.0]`.
#[derive(Default)]
pub struct OperatorStats {
    counts: HashMap<CrossoverOp, (u32, u32)>,
}

impl OperatorStats {
    pub fn record(&mut self, op: CrossoverOp, improved: bool) {
        let entry = self.counts.entry(op).or_insert((0, 0));
        entry.1 += 1;
        if improved {
            entry.0 += 1;
        }
    }

    pub fn rederive_weights(&mut self) -> HashMap<CrossoverOp, f64> {
        let mut weights = HashMap::new();
        for op in ALL_CROSSOVER_OPS {
            let (improved, uses) = self.counts.get(&op).copied().unwrap_or((0, 0));
            let ratio = if uses == 0 { 1.0 } else { improved as f64 / uses as f64 };
            weights.insert(op, ratio.clamp(0.1, 5.0));
        }
        self.counts.clear();
        weights
    }
}

pub struct GaOutcome {
    pub assignments: Vec<Assignment>,
    pub metadata: SolveMetadata,
    pub best_fitness: f64,
    pub generations_used: u32,
}

/// Runs the GA to termination: `max_generations` reached, `time_limit_seconds` exceeded, or
/// 20 consecutive generations without improvement.
pub fn run(
    grid: &VariableGrid,
    constraints_config: &GlobalConstraints,
    weights: &ObjectiveWeights,
    config: &GaConfig,
    time_limit_seconds: u64,
    seed: u64,
) -> Result<GaOutcome, scheduler_dao::error::SolveError> {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let sessions = sessions_per_class(constraints_config.min_periods_per_week, grid.total_weeks.max(1));
    let mut population: Vec<Chromosome> = (0..config.population_size.max(1))
        .map(|_| Chromosome::random(grid.classes.len(), sessions, grid.total_weeks.max(1), &mut rng))
        .collect();

    let mut controller = AdaptiveController::new(5);
    let mut mutation_rate = config.mutation_rate;
    let mut crossover_rate = config.crossover_rate;
    let allowed_ops = allowed_crossover_ops();
    let mut operator_weights: HashMap<CrossoverOp, f64> = allowed_ops.iter().map(|&op| (op, 1.0)).collect();
    let mut operator_stats = OperatorStats::default();

    let use_auto = config.population_size > 0 && grid.classes.len() * sessions < 20 || constraints_config.max_classes_per_day == 0;

    let mut best_fitness = f64::NEG_INFINITY;
    let mut best_chromosome = population[0].clone();
    let mut generations_without_improvement = 0u32;
    let mut generation = 0u32;
    let start = Instant::now();

    loop {
        let fitnesses: Vec<f64> = parallel::scatter_gather(&population, config.parallel_fitness, |c| fitness(c, grid, constraints_config, weights))
            .into_iter()
            .map(|v| v.unwrap_or(f64::NEG_INFINITY))
            .collect();

        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|&a, &b| fitnesses[b].partial_cmp(&fitnesses[a]).unwrap_or(std::cmp::Ordering::Equal));
        let sorted_population: Vec<Chromosome> = order.iter().map(|&i| population[i].clone()).collect();
        let sorted_fitnesses: Vec<f64> = order.iter().map(|&i| fitnesses[i]).collect();

        if sorted_fitnesses[0] > best_fitness {
            best_fitness = sorted_fitnesses[0];
            best_chromosome = sorted_population[0].clone();
            generations_without_improvement = 0;
        } else {
            generations_without_improvement += 1;
        }

        let avg_fitness = {
            let finite: Vec<f64> = sorted_fitnesses.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() { f64::NEG_INFINITY } else { finite.iter().sum::<f64>() / finite.len() as f64 }
        };
        let current_diversity = diversity(&sorted_population);

        if generation % config.adaptation_interval.max(1) == 0 {
            info!(
                "ga: generation {} best={:.1} avg={:.1} diversity={:.3}",
                generation, best_fitness, avg_fitness, current_diversity
            );
        }

        if config.use_adaptive_control && generation % config.adaptation_interval.max(1) == 0 {
            controller.record(current_diversity, best_fitness);
            mutation_rate = controller.next_mutation_rate(config, current_diversity, mutation_rate);
            crossover_rate = controller.next_crossover_rate(config, current_diversity, crossover_rate);
            operator_weights = operator_stats.rederive_weights();
        }

        generation += 1;
        if generation >= config.max_generations || generations_without_improvement >= 20 || start.elapsed().as_secs() >= time_limit_seconds {
            break;
        }

        let elite_size = config.elite_size.min(sorted_population.len());
        let mut next_population: Vec<Chromosome> = sorted_population[..elite_size].to_vec();
        let total_weeks = grid.total_weeks.max(1);

        while next_population.len() < config.population_size {
            if rng.random_bool(crossover_rate.clamp(0.0, 1.0)) {
                let parent_a = tournament(&sorted_population, &sorted_fitnesses, 3, &mut rng);
                let parent_b = tournament(&sorted_population, &sorted_fitnesses, 3, &mut rng);
                let op = if use_auto {
                    select_operator_auto(parent_a.genes.len(), constraints_config.max_classes_per_day, &allowed_ops)
                } else {
                    select_operator_roulette(&operator_weights, &allowed_ops, &mut rng)
                };
                let (mut child1, mut child2) = crossover(op, parent_a, parent_b, &mut rng);
                mutate(&mut child1, mutation_rate, total_weeks, &mut rng);
                mutate(&mut child2, mutation_rate, total_weeks, &mut rng);
                for child in [child1, child2] {
                    if next_population.len() >= config.population_size {
                        break;
                    }
                    if child.is_valid(constraints_config.max_classes_per_day, constraints_config.max_classes_per_week, constraints_config.allow_consecutive_classes) {
                        let child_fitness = fitness(&child, grid, constraints_config, weights);
                        operator_stats.record(op, child_fitness > best_fitness);
                        next_population.push(child);
                    }
                }
            } else {
                let parent = tournament(&sorted_population, &sorted_fitnesses, 3, &mut rng);
                let mut child = parent.clone();
                mutate(&mut child, mutation_rate, total_weeks, &mut rng);
                if child.is_valid(constraints_config.max_classes_per_day, constraints_config.max_classes_per_week, constraints_config.allow_consecutive_classes) {
                    next_population.push(child);
                }
            }
        }
        population = next_population;
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    if !best_fitness.is_finite() {
        return Err(scheduler_dao::error::SolveError::NoSolution);
    }
    let assignments = best_chromosome.decode_canonical(&grid.classes, grid.start_date);

    Ok(GaOutcome {
        assignments,
        metadata: SolveMetadata {
            duration_ms,
            solutions_found: generation,
            score: (best_fitness * 100.0).round() as i64,
            gap: 0.0,
            distribution: None,
            solver: "genetic".to_string(),
            error: None,
            relaxation_level: None,
            relaxation_status: None,
        },
        best_fitness,
        generations_used: generation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_dao::model::class::{Class, WeeklySchedule};
    use scheduler_dao::model::request::ScheduleRequest;
    use chrono::NaiveDate;
    use std::collections::HashMap as Map;

    fn simple_grid() -> VariableGrid {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let class = Class::new("c1", "Class 1", "3", WeeklySchedule::default());
        let request = ScheduleRequest {
            classes: vec![class],
            instructor_availability: Vec::new(),
            start_date: start,
            end_date: end,
            constraints: GlobalConstraints { start_date: start, end_date: end, max_classes_per_day: 1, max_classes_per_week: 1, min_periods_per_week: 1, ..Default::default() },
            options: Map::new(),
        };
        VariableGrid::build(&request).unwrap()
    }

    #[test]
    fn deterministic_with_fixed_seed() {
        parallel::set_test_mode(true);
        let grid = simple_grid();
        let constraints_config = grid_constraints(&grid);
        let weights = ObjectiveWeights::default();
        let mut config = GaConfig::default();
        config.population_size = 10;
        config.max_generations = 5;
        config.parallel_fitness = false;
        let a = run(&grid, &constraints_config, &weights, &config, 5, 7).unwrap();
        let b = run(&grid, &constraints_config, &weights, &config, 5, 7).unwrap();
        assert_eq!(a.assignments, b.assignments);
        parallel::reset_test_flags();
    }

    fn grid_constraints(grid: &VariableGrid) -> GlobalConstraints {
        GlobalConstraints {
            max_classes_per_day: 1,
            max_classes_per_week: 1,
            min_periods_per_week: 1,
            start_date: grid.start_date,
            end_date: grid.end_date,
            ..Default::default()
        }
    }

    #[test]
    fn diversity_is_zero_for_identical_population() {
        let chromosome = Chromosome { genes: vec![Gene { class_index: 0, day_of_week: 1, period: 1, week: 0 }] };
        let population = vec![chromosome.clone(), chromosome];
        assert_eq!(diversity(&population), 0.0);
    }

    #[test]
    fn adaptive_controller_raises_mutation_as_diversity_falls() {
        let config = GaConfig::default();
        let mut controller = AdaptiveController::new(5);
        let mut rate = config.mutation_rate;
        let mut previous = 0.0;
        for diversity in [0.5, 0.4, 0.3, 0.2, 0.1] {
            controller.record(diversity, 0.0);
            let next = controller.next_mutation_rate(&config, diversity, rate);
            assert!(next >= previous, "mutation rate should not decrease as diversity falls");
            previous = next;
            rate = next;
        }
    }
}
