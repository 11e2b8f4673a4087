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

use scheduler_dao::error::SolveError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverType {
    OrTools,
    Genetic,
    Hybrid,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    Minimal,
    Standard,
    Intensive,
    Maximum,
}

impl OptimizationLevel {
    /// Population size and time-budget scaling factor used by callers that derive
    /// per-level defaults from the base `GaConfig`.
    pub fn scale(&self) -> f64 {
        match self {
            OptimizationLevel::Minimal => 0.5,
            OptimizationLevel::Standard => 1.0,
            OptimizationLevel::Intensive => 1.5,
            OptimizationLevel::Maximum => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaConfig {
    pub population_size: usize,
    pub elite_size: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub max_generations: u32,
    pub convergence_threshold: f64,
    pub use_adaptive_control: bool,
    pub adaptation_interval: u32,
    pub diversity_threshold: f64,
    pub adaptation_strength: f64,
    pub parallel_fitness: bool,
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            population_size: 100,
            elite_size: 2,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            max_generations: 100,
            convergence_threshold: 0.001,
            use_adaptive_control: true,
            adaptation_interval: 5,
            diversity_threshold: 0.15,
            adaptation_strength: 0.5,
            parallel_fitness: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    pub population_size: usize,
    pub generations: u32,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub eval_time_limit_seconds: u64,
    pub parallel_evaluation: bool,
}

impl Default for MetaConfig {
    fn default() -> Self {
        MetaConfig {
            population_size: 20,
            generations: 10,
            mutation_rate: 0.2,
            crossover_rate: 0.7,
            eval_time_limit_seconds: 60,
            parallel_evaluation: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub solver_type: SolverType,
    pub optimization_level: OptimizationLevel,
    pub timeout_seconds: u64,
    pub max_iterations: u32,
    pub enable_relaxation: bool,
    pub enable_distribution_optimization: bool,
    pub enable_workload_balancing: bool,
    pub weights: Option<HashMap<String, f64>>,
    pub debug_mode: bool,
    pub parallel_execution: bool,
    pub experimental_features: bool,
    pub allow_partial_solution: bool,
    /// Mirrors the original request-level `requireExactSolution` flag: when set, the
    /// genetic and hybrid backends refuse the request outright (an approximate solver
    /// cannot guarantee exactness) and strategy selection under `SolverType::Meta` is
    /// restricted to `or_tools`.
    pub require_exact_solution: bool,
    pub ga: GaConfig,
    pub meta: MetaConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            solver_type: SolverType::Hybrid,
            optimization_level: OptimizationLevel::Standard,
            timeout_seconds: 60,
            max_iterations: 100,
            enable_relaxation: true,
            enable_distribution_optimization: true,
            enable_workload_balancing: true,
            weights: None,
            debug_mode: false,
            parallel_execution: true,
            experimental_features: false,
            allow_partial_solution: false,
            require_exact_solution: false,
            ga: GaConfig::default(),
            meta: MetaConfig::default(),
        }
    }
}

fn parse_opt<T: FromStr>(options: &HashMap<String, Value>, key: &str) -> Result<Option<T>, SolveError> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(None),
        Some(v) => {
            let as_str = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            as_str
                .parse::<T>()
                .map(Some)
                .map_err(|_| SolveError::validation(key, format!("could not parse '{}'", as_str)))
        }
    }
}

impl SolverConfig {
    /// Builds a configuration from the free-form options map carried on a `ScheduleRequest`,
    /// falling back to defaults and then applying environment-variable overrides.
    pub fn from_options(options: &HashMap<String, Value>) -> Result<Self, SolveError> {
        let mut config = SolverConfig::default();

        if let Some(solver_type) = options.get("solver_type").and_then(Value::as_str) {
            config.solver_type = match solver_type {
                "or_tools" => SolverType::OrTools,
                "genetic" => SolverType::Genetic,
                "hybrid" => SolverType::Hybrid,
                "meta" => SolverType::Meta,
                other => return Err(SolveError::validation("solver_type", format!("unknown solver_type '{}'", other))),
            };
        }
        if let Some(level) = options.get("optimization_level").and_then(Value::as_str) {
            config.optimization_level = match level {
                "minimal" => OptimizationLevel::Minimal,
                "standard" => OptimizationLevel::Standard,
                "intensive" => OptimizationLevel::Intensive,
                "maximum" => OptimizationLevel::Maximum,
                other => return Err(SolveError::validation("optimization_level", format!("unknown optimization_level '{}'", other))),
            };
        }
        if let Some(v) = parse_opt::<u64>(options, "timeout_seconds")? {
            if v == 0 {
                return Err(SolveError::validation("timeout_seconds", "must be > 0"));
            }
            config.timeout_seconds = v;
        }
        if let Some(v) = parse_opt::<u32>(options, "max_iterations")? {
            config.max_iterations = v;
        }
        if let Some(v) = parse_opt::<usize>(options, "population_size")? {
            config.ga.population_size = v;
        }
        if let Some(v) = parse_opt::<f64>(options, "mutation_rate")? {
            if !(0.0..=1.0).contains(&v) {
                return Err(SolveError::validation("mutation_rate", "must be within [0, 1]"));
            }
            config.ga.mutation_rate = v;
        }
        if let Some(v) = parse_opt::<f64>(options, "crossover_rate")? {
            if !(0.0..=1.0).contains(&v) {
                return Err(SolveError::validation("crossover_rate", "must be within [0, 1]"));
            }
            config.ga.crossover_rate = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "enable_relaxation")? {
            config.enable_relaxation = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "enable_distribution_optimization")? {
            config.enable_distribution_optimization = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "enable_workload_balancing")? {
            config.enable_workload_balancing = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "debug_mode")? {
            config.debug_mode = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "parallel_execution")? {
            config.parallel_execution = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "experimental_features")? {
            config.experimental_features = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "allow_partial_solution")? {
            config.allow_partial_solution = v;
        }
        if let Some(v) = parse_opt::<bool>(options, "require_exact_solution")? {
            config.require_exact_solution = v;
        }
        if let Some(Value::Object(map)) = options.get("weights") {
            let mut weights = HashMap::new();
            for (key, value) in map {
                if !scheduler_dao::weights::WEIGHT_KEYS.contains(&key.as_str()) {
                    return Err(SolveError::validation("weights", format!("unknown weight key '{}'", key)));
                }
                let value = value
                    .as_f64()
                    .ok_or_else(|| SolveError::validation("weights", format!("weight '{}' must be numeric", key)))?;
                weights.insert(key.clone(), value);
            }
            config.weights = Some(weights);
        }

        const RECOGNIZED: &[&str] = &[
            "solver_type",
            "optimization_level",
            "timeout_seconds",
            "max_iterations",
            "population_size",
            "mutation_rate",
            "crossover_rate",
            "enable_relaxation",
            "enable_distribution_optimization",
            "enable_workload_balancing",
            "weights",
            "debug_mode",
            "parallel_execution",
            "experimental_features",
            "allow_partial_solution",
            "require_exact_solution",
        ];
        for key in options.keys() {
            if !RECOGNIZED.contains(&key.as_str()) {
                return Err(SolveError::validation("options", format!("unrecognized configuration option '{}'", key)));
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies the documented `GA_*`/`META_*`/`ENABLE_*`/`SOLVER_TIME_LIMIT` environment
    /// overrides, using a "read env var, fall back to struct default" idiom.
    fn apply_env_overrides(&mut self) {
        fn env_parse<T: FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|v| v.parse::<T>().ok())
        }
        fn env_bool(name: &str) -> Option<bool> {
            env_parse::<u8>(name).map(|v| v != 0)
        }

        if let Some(v) = env_parse::<usize>("GA_POPULATION_SIZE") {
            self.ga.population_size = v;
        }
        if let Some(v) = env_parse::<usize>("GA_ELITE_SIZE") {
            self.ga.elite_size = v;
        }
        if let Some(v) = env_parse::<f64>("GA_MUTATION_RATE") {
            self.ga.mutation_rate = v;
        }
        if let Some(v) = env_parse::<f64>("GA_CROSSOVER_RATE") {
            self.ga.crossover_rate = v;
        }
        if let Some(v) = env_parse::<u32>("GA_MAX_GENERATIONS") {
            self.ga.max_generations = v;
        }
        if let Some(v) = env_parse::<f64>("GA_CONVERGENCE_THRESHOLD") {
            self.ga.convergence_threshold = v;
        }
        if let Some(v) = env_bool("GA_USE_ADAPTIVE_CONTROL") {
            self.ga.use_adaptive_control = v;
        }
        if let Some(v) = env_parse::<u32>("GA_ADAPTATION_INTERVAL") {
            self.ga.adaptation_interval = v;
        }
        if let Some(v) = env_parse::<f64>("GA_DIVERSITY_THRESHOLD") {
            self.ga.diversity_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("GA_ADAPTATION_STRENGTH") {
            self.ga.adaptation_strength = v;
        }
        if let Some(v) = env_bool("GA_PARALLEL_FITNESS") {
            self.ga.parallel_fitness = v;
        }
        // GA_CROSSOVER_METHODS (comma list) is read directly by the crossover operator
        // selector, which needs the parsed operator tags rather than a config scalar.

        if let Some(v) = env_parse::<usize>("META_POPULATION_SIZE") {
            self.meta.population_size = v;
        }
        if let Some(v) = env_parse::<u32>("META_GENERATIONS") {
            self.meta.generations = v;
        }
        if let Some(v) = env_parse::<f64>("META_MUTATION_RATE") {
            self.meta.mutation_rate = v;
        }
        if let Some(v) = env_parse::<f64>("META_CROSSOVER_RATE") {
            self.meta.crossover_rate = v;
        }
        if let Some(v) = env_parse::<u64>("META_EVAL_TIME_LIMIT") {
            self.meta.eval_time_limit_seconds = v;
        }
        if let Some(v) = env_bool("META_PARALLEL_EVALUATION") {
            self.meta.parallel_evaluation = v;
        }

        if let Some(v) = env_bool("ENABLE_CONSTRAINT_RELAXATION") {
            self.enable_relaxation = v;
        }
        if let Some(v) = env_parse::<u64>("SOLVER_TIME_LIMIT") {
            self.timeout_seconds = v;
        }
        // ENABLE_GRADE_GROUPING, ENABLE_CONSECUTIVE_CLASSES and ENABLE_TEACHER_BREAKS gate
        // optional feature toggles read directly by the constraint/objective factories that
        // need them (`default_constraints`, `install_objective`); ENABLE_GENETIC_OPTIMIZATION
        // is read by `unified::can_solve_genetic` and ENABLE_WEIGHT_TUNING by `meta::run`, to
        // avoid growing this struct with one flag per enabled feature.
    }

    pub fn crossover_methods_from_env() -> Option<Vec<String>> {
        env::var("GA_CROSSOVER_METHODS").ok().map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
    }

    pub fn feature_enabled(name: &str, default: bool) -> bool {
        env::var(name).ok().map(|v| v != "0").unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_option() {
        let mut options = HashMap::new();
        options.insert("not_an_option".to_string(), Value::Bool(true));
        assert!(SolverConfig::from_options(&options).is_err());
    }

    #[test]
    fn rejects_out_of_range_mutation_rate() {
        let mut options = HashMap::new();
        options.insert("mutation_rate".to_string(), Value::from(1.5));
        assert!(SolverConfig::from_options(&options).is_err());
    }
}
