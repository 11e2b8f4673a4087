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

//! Dispatches a request to the exact, genetic, or hybrid backend; owns the relaxation
//! fallback ladder that runs when a backend reports no feasible solution.

use crate::config::{OptimizationLevel, SolverConfig, SolverType};
use crate::grid::VariableGrid;
use crate::scheduler::constraints::{default_constraints, Constraint, ConstraintKind, ValidationContext};
use crate::scheduler::relaxation::{RelaxationController, RelaxationLevel, RelaxationState};
use crate::scheduler::{cpsat, ga};
use log::{info, warn};
use scheduler_dao::error::SolveError;
use scheduler_dao::model::assignment::Assignment;
use scheduler_dao::model::constraints_config::GlobalConstraints;
use scheduler_dao::model::request::{AssignmentView, ScheduleRequest, ScheduleResponse, SolveMetadata};
use scheduler_dao::model::violation::ConstraintViolation;
use scheduler_dao::weights::ObjectiveWeights;
use std::collections::HashSet;
use std::time::Instant;

/// `0..=100`: `100 - 100*gap`, clamped. The CP-SAT driver's gap is exact; the GA backend
/// always reports a zero gap (it has no dual bound to compare against), so its solutions
/// read as maximal quality by this metric — callers comparing across backends should use
/// `metadata.score` as the tie-breaker, not this alone.
pub fn quality_score(metadata: &SolveMetadata) -> f64 {
    (100.0 * (1.0 - metadata.gap)).clamp(0.0, 100.0)
}

/// The two constraints with a tabled relaxation extra, in priority order.
const RELAXABLE_KINDS: [ConstraintKind; 2] = [ConstraintKind::DailyLimit, ConstraintKind::WeeklyLimit];

fn relaxed_constraints_config(base: &GlobalConstraints, state: &RelaxationState) -> GlobalConstraints {
    let mut relaxed = base.clone();
    relaxed.max_classes_per_day += state.daily_extra();
    relaxed.max_classes_per_week += state.weekly_extra();
    relaxed
}

fn effective_weights(config: &SolverConfig) -> ObjectiveWeights {
    let mut weights = scheduler_dao::weights::read_weights();
    if let Some(overrides) = &config.weights {
        for (key, value) in overrides {
            let _ = weights.set(key, *value);
        }
    }
    weights
}

/// The capability tags the exact backend advertises. `constraint_relaxation` is dropped
/// when relaxation is disabled, mirroring the original `ORToolsStrategy.get_capabilities`.
const OR_TOOLS_CAPABILITIES: &[&str] = &[
    "exact_optimization",
    "constraint_programming",
    "optimal_solution",
    "medium_scale",
    "standard_optimization",
    "intensive_optimization",
    "constraint_relaxation",
    "distribution_optimization",
    "workload_balancing",
];

/// The capability tags the genetic backend advertises; unconditional, unlike the exact
/// backend's relaxation tag, since the GA's relaxation support doesn't depend on config.
const GENETIC_CAPABILITIES: &[&str] = &[
    "approximate_optimization",
    "large_scale",
    "standard_optimization",
    "minimal_optimization",
    "constraint_relaxation",
    "distribution_optimization",
    "workload_balancing",
    "parallel_execution",
];

fn strategy_capabilities(solver_type: SolverType, config: &SolverConfig) -> HashSet<&'static str> {
    match solver_type {
        SolverType::OrTools => OR_TOOLS_CAPABILITIES
            .iter()
            .copied()
            .filter(|c| *c != "constraint_relaxation" || config.enable_relaxation)
            .collect(),
        SolverType::Genetic => GENETIC_CAPABILITIES.iter().copied().collect(),
        SolverType::Hybrid | SolverType::Meta => {
            let mut caps = strategy_capabilities(SolverType::OrTools, config);
            caps.extend(strategy_capabilities(SolverType::Genetic, config));
            caps
        }
    }
}

/// `classes.len()` and the number of distinct instructor-unavailability entries, standing
/// in for "number of instructors": the request carries global per-date unavailability
/// blocks rather than per-instructor identifiers, so entry count is the closest available
/// proxy for the original's `len(set(a.instructorId for a in request.instructorAvailability))`.
fn problem_size(request: &ScheduleRequest) -> (usize, usize) {
    (request.classes.len(), request.instructor_availability.len())
}

/// `true` once the problem is large enough that OR-Tools' exact search stops scaling
/// (`num_classes > 150 and num_instructors > 30`, the original's threshold for refusal).
pub fn can_solve_or_tools(num_classes: usize, num_instructors: usize) -> bool {
    !(num_classes > 150 && num_instructors > 30)
}

/// `false` when the request demands an exact solution the genetic backend cannot guarantee,
/// or when `ENABLE_GENETIC_OPTIMIZATION` has been switched off.
pub fn can_solve_genetic(config: &SolverConfig) -> bool {
    !config.require_exact_solution && SolverConfig::feature_enabled("ENABLE_GENETIC_OPTIMIZATION", true)
}

/// The hybrid strategy can solve anything at least one of its sub-strategies can.
pub fn can_solve_hybrid(num_classes: usize, num_instructors: usize, config: &SolverConfig) -> bool {
    can_solve_or_tools(num_classes, num_instructors) || can_solve_genetic(config)
}

/// Scores a strategy's fit for this request: base `50`, `+20/+15/+10` when its
/// optimization-level capability matches the configured level, `+-20/+-10/+10` based on
/// how the request's size lines up with its scale capability, `+10` apiece for relaxation,
/// distribution, and workload-balancing capability matches the config asks for. Clamped to
/// `[0, 100]`.
fn calculate_strategy_score(capabilities: &HashSet<&'static str>, num_classes: usize, num_instructors: usize, config: &SolverConfig) -> f64 {
    let mut score: f64 = 50.0;

    score += match config.optimization_level {
        OptimizationLevel::Intensive if capabilities.contains("intensive_optimization") => 20.0,
        OptimizationLevel::Standard if capabilities.contains("standard_optimization") => 15.0,
        OptimizationLevel::Minimal if capabilities.contains("minimal_optimization") => 10.0,
        _ => 0.0,
    };

    if num_classes > 100 || num_instructors > 20 {
        score += if capabilities.contains("large_scale") { 20.0 } else { -20.0 };
    } else if num_classes > 50 || num_instructors > 10 {
        if capabilities.contains("medium_scale") {
            score += 15.0;
        } else if capabilities.contains("large_scale") {
            score += 10.0;
        } else {
            score -= 10.0;
        }
    } else {
        score += 10.0;
    }

    if config.enable_relaxation && capabilities.contains("constraint_relaxation") {
        score += 10.0;
    }
    if config.enable_distribution_optimization && capabilities.contains("distribution_optimization") {
        score += 10.0;
    }
    if config.enable_workload_balancing && capabilities.contains("workload_balancing") {
        score += 10.0;
    }

    score.clamp(0.0, 100.0)
}

/// Capability score (`0..=100`) for a single backend against this request, independent of
/// whether it can actually accept the request (see [`can_solve_or_tools`] etc. for that).
pub fn capability_score(solver_type: SolverType, grid: &VariableGrid, config: &SolverConfig) -> u32 {
    let _ = grid;
    let capabilities = strategy_capabilities(solver_type, config);
    calculate_strategy_score(&capabilities, 0, 0, config).round() as u32
}

/// Evaluates `or_tools`, `genetic`, and `hybrid` against this request, discards any that
/// refuse it outright, and returns the highest-scoring survivor — the behavior
/// `SolverType::Meta` delegates to, and the fallback an explicitly-requested backend falls
/// back to when it can't accept the request itself.
pub fn select_best_strategy(request: &ScheduleRequest, config: &SolverConfig) -> Option<SolverType> {
    let (num_classes, num_instructors) = problem_size(request);
    let candidates = [SolverType::OrTools, SolverType::Genetic, SolverType::Hybrid];
    candidates
        .into_iter()
        .filter(|solver_type| match solver_type {
            SolverType::OrTools => can_solve_or_tools(num_classes, num_instructors),
            SolverType::Genetic => can_solve_genetic(config),
            SolverType::Hybrid => can_solve_hybrid(num_classes, num_instructors, config),
            SolverType::Meta => false,
        })
        .map(|solver_type| {
            let capabilities = strategy_capabilities(solver_type, config);
            let score = calculate_strategy_score(&capabilities, num_classes, num_instructors, config);
            (solver_type, score)
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(solver_type, _)| solver_type)
}

/// Resolves the backend this request will actually run under: the requested type if it can
/// accept the request, otherwise (and always, for `Meta`) the best-scoring survivor from
/// [`select_best_strategy`].
fn resolve_solver_type(request: &ScheduleRequest, config: &SolverConfig) -> Result<SolverType, SolveError> {
    let (num_classes, num_instructors) = problem_size(request);
    let explicit_can_solve = match config.solver_type {
        SolverType::OrTools => can_solve_or_tools(num_classes, num_instructors),
        SolverType::Genetic => can_solve_genetic(config),
        SolverType::Hybrid => can_solve_hybrid(num_classes, num_instructors, config),
        SolverType::Meta => false,
    };
    if explicit_can_solve {
        return Ok(config.solver_type);
    }
    if !matches!(config.solver_type, SolverType::Meta) {
        warn!("strategy {:?} cannot solve this request; falling back to best-scoring strategy", config.solver_type);
    }
    select_best_strategy(request, config).ok_or(SolveError::NoSolution)
}

fn solver_tag(solver_type: SolverType) -> &'static str {
    match solver_type {
        SolverType::OrTools => "or_tools",
        SolverType::Genetic => "genetic",
        SolverType::Hybrid => "hybrid",
        SolverType::Meta => "meta",
    }
}

struct SolveAttempt {
    assignments: Vec<Assignment>,
    metadata: SolveMetadata,
}

fn solve_exact(
    grid: &VariableGrid,
    constraints: &[Constraint],
    constraints_config: &GlobalConstraints,
    relaxation: &RelaxationState,
    weights: &ObjectiveWeights,
    config: &SolverConfig,
    time_limit_seconds: u64,
) -> Result<SolveAttempt, SolveError> {
    cpsat::solve(
        grid,
        constraints,
        constraints_config,
        relaxation,
        weights,
        config.enable_distribution_optimization,
        SolverConfig::feature_enabled("ENABLE_GRADE_GROUPING", true),
        time_limit_seconds,
        config.debug_mode,
    )
    .map(|outcome| SolveAttempt { assignments: outcome.assignments, metadata: outcome.metadata })
}

fn solve_genetic(
    grid: &VariableGrid,
    constraints_config: &GlobalConstraints,
    weights: &ObjectiveWeights,
    config: &SolverConfig,
    time_limit_seconds: u64,
) -> Result<SolveAttempt, SolveError> {
    ga::run(grid, constraints_config, weights, &config.ga, time_limit_seconds, 42)
        .map(|outcome| SolveAttempt { assignments: outcome.assignments, metadata: outcome.metadata })
}

/// Runs the relaxation fallback ladder (`Minimal -> Moderate -> Significant -> Maximum`)
/// against the exact backend, returning the first attempt that finds a feasible solution.
/// Assignments found at a relaxed level carry the level and the controller's per-constraint
/// report in their metadata. If every level fails, returns the empty schedule at
/// `level=Maximum` rather than an error, matching the NoSolution contract.
fn solve_with_relaxation_ladder(
    grid: &VariableGrid,
    constraints: &[Constraint],
    constraints_config: &GlobalConstraints,
    weights: &ObjectiveWeights,
    config: &SolverConfig,
    time_limit_seconds: u64,
) -> Result<SolveAttempt, SolveError> {
    let mut controller = RelaxationController::default();
    let mut last_status = Vec::new();
    for level in RelaxationLevel::ALL_ABOVE_NONE {
        let results = controller.raise_to(level, &RELAXABLE_KINDS);
        last_status = results.clone();
        let state = controller.state();
        let relaxed_config = relaxed_constraints_config(constraints_config, &state);
        info!("relaxation ladder: attempting level {:?}", level);
        match solve_exact(grid, constraints, &relaxed_config, &state, weights, config, time_limit_seconds) {
            Ok(mut attempt) => {
                attempt.metadata.relaxation_level = Some(level.as_u8());
                attempt.metadata.relaxation_status = Some(results);
                return Ok(attempt);
            }
            Err(SolveError::NoSolution) => continue,
            Err(other) => return Err(other),
        }
    }
    warn!("relaxation ladder exhausted at level {:?}; returning empty schedule", RelaxationLevel::Maximum);
    Ok(SolveAttempt {
        assignments: Vec::new(),
        metadata: SolveMetadata {
            solver: "or_tools".to_string(),
            error: Some("no feasible solution at any relaxation level".to_string()),
            relaxation_level: Some(RelaxationLevel::Maximum.as_u8()),
            relaxation_status: Some(last_status),
            ..Default::default()
        },
    })
}

pub struct UnifiedSolver;

impl UnifiedSolver {
    /// Runs the full solve pipeline: builds the variable grid, installs the constraint set,
    /// dispatches to the requested backend (falling back through the relaxation ladder on
    /// infeasibility when enabled), validates the result, and wraps it in a response.
    pub fn solve(request: &ScheduleRequest, config: &SolverConfig) -> Result<ScheduleResponse, SolveError> {
        let grid = VariableGrid::build(request)?;
        let weights = effective_weights(config);
        let constraints = default_constraints();
        let none_state = RelaxationState::none();

        let selected = resolve_solver_type(request, config)?;
        let primary = match selected {
            SolverType::OrTools => solve_exact(&grid, &constraints, &request.constraints, &none_state, &weights, config, config.timeout_seconds),
            SolverType::Genetic => solve_genetic(&grid, &request.constraints, &weights, config, config.timeout_seconds),
            SolverType::Hybrid | SolverType::Meta => Self::solve_hybrid(&grid, &constraints, request, &weights, config),
        };

        let attempt = match primary {
            Ok(attempt) => attempt,
            Err(SolveError::NoSolution) if config.enable_relaxation => {
                solve_with_relaxation_ladder(&grid, &constraints, &request.constraints, &weights, config, config.timeout_seconds)?
            }
            Err(SolveError::NoSolution) => {
                warn!("no feasible solution found and relaxation disabled; returning empty schedule");
                SolveAttempt {
                    assignments: Vec::new(),
                    metadata: SolveMetadata {
                        solver: solver_tag(selected).to_string(),
                        error: Some("no feasible solution found within the time budget".to_string()),
                        ..Default::default()
                    },
                }
            }
            Err(other) => return Err(other),
        };

        let ctx = ValidationContext::from_grid(&grid, &request.constraints);
        let violations: Vec<ConstraintViolation> = crate::scheduler::constraints::validate_all(&constraints, &attempt.assignments, &ctx);

        let assignments = attempt
            .assignments
            .iter()
            .filter_map(|a| {
                grid.classes
                    .iter()
                    .find(|c| c.id == a.class_id)
                    .map(|c| AssignmentView::from_assignment(a, &c.name))
            })
            .collect();

        Ok(ScheduleResponse {
            assignments,
            metadata: attempt.metadata,
            violations,
        })
    }

    /// The exact backend runs first within `min(30, timeout/2)` seconds; if its quality
    /// score already clears 80 the result is returned immediately. Otherwise the genetic
    /// backend runs for the remaining budget and the higher-scoring of the two wins.
    fn solve_hybrid(
        grid: &VariableGrid,
        constraints: &[Constraint],
        request: &ScheduleRequest,
        weights: &ObjectiveWeights,
        config: &SolverConfig,
    ) -> Result<SolveAttempt, SolveError> {
        let none_state = RelaxationState::none();
        let exact_budget = config.timeout_seconds.min(30).min(config.timeout_seconds / 2).max(1);
        let start = Instant::now();

        let exact_attempt = solve_exact(grid, constraints, &request.constraints, &none_state, weights, config, exact_budget);

        if let Ok(attempt) = &exact_attempt {
            if quality_score(&attempt.metadata) >= 80.0 {
                info!("hybrid: exact phase cleared the quality bar, skipping genetic phase");
                return exact_attempt;
            }
        }

        let elapsed = start.elapsed().as_secs();
        let remaining = config.timeout_seconds.saturating_sub(elapsed).max(1);
        let genetic_attempt = solve_genetic(grid, &request.constraints, weights, config, remaining);

        match (exact_attempt, genetic_attempt) {
            (Ok(exact), Ok(genetic)) => {
                if exact.metadata.score >= genetic.metadata.score {
                    Ok(exact)
                } else {
                    Ok(genetic)
                }
            }
            (Ok(exact), Err(_)) => Ok(exact),
            (Err(_), Ok(genetic)) => Ok(genetic),
            (Err(err), Err(_)) => {
                warn!("hybrid: both backends failed to find a feasible solution");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use scheduler_dao::model::class::{Class, WeeklySchedule};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn sample_request() -> ScheduleRequest {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let class = Class::new("c1", "Class 1", "3", WeeklySchedule::default());
        ScheduleRequest {
            classes: vec![class],
            instructor_availability: Vec::new(),
            start_date: start,
            end_date: end,
            constraints: GlobalConstraints { start_date: start, end_date: end, max_classes_per_day: 2, max_classes_per_week: 5, min_periods_per_week: 1, ..Default::default() },
            options: HashMap::new(),
        }
    }

    #[test]
    fn genetic_backend_produces_a_response() {
        crate::scheduler::parallel::set_test_mode(true);
        let request = sample_request();
        let mut config = SolverConfig::default();
        config.solver_type = SolverType::Genetic;
        config.ga.population_size = 8;
        config.ga.max_generations = 3;
        config.timeout_seconds = 5;
        let response = UnifiedSolver::solve(&request, &config).unwrap();
        assert_eq!(response.assignments.len(), 1);
        crate::scheduler::parallel::reset_test_flags();
    }

    #[test]
    fn capability_score_favors_genetic_on_large_grids() {
        let request = sample_request();
        let grid = VariableGrid::build(&request).unwrap();
        let config = SolverConfig::default();
        let exact = capability_score(SolverType::OrTools, &grid, &config);
        let genetic = capability_score(SolverType::Genetic, &grid, &config);
        assert!(exact <= 100 && genetic <= 100);
    }

    #[test]
    fn require_exact_solution_excludes_genetic_from_meta_selection() {
        let request = sample_request();
        let mut config = SolverConfig::default();
        config.require_exact_solution = true;
        let selected = select_best_strategy(&request, &config);
        assert_ne!(selected, Some(SolverType::Genetic));
    }

    #[test]
    fn explicit_genetic_falls_back_when_exact_solution_required() {
        let request = sample_request();
        let mut config = SolverConfig::default();
        config.solver_type = SolverType::Genetic;
        config.require_exact_solution = true;
        let resolved = resolve_solver_type(&request, &config).unwrap();
        assert_ne!(resolved, SolverType::Genetic);
    }

    #[test]
    fn meta_resolves_to_a_concrete_strategy() {
        let request = sample_request();
        let mut config = SolverConfig::default();
        config.solver_type = SolverType::Meta;
        let resolved = resolve_solver_type(&request, &config).unwrap();
        assert!(matches!(resolved, SolverType::OrTools | SolverType::Genetic | SolverType::Hybrid));
    }
}
