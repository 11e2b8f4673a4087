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

//! Scatter-gather worker pool shared by the GA's per-generation fitness pass and the
//! meta-optimizer's inner-solve evaluation. Workers are stateless: each receives a read-only
//! item and returns an owned result; results are reassembled in the original index order. A
//! worker that panics yields `None` for that slot rather than aborting the batch.

use log::warn;
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Forces sequential evaluation, for deterministic single-thread tests.
pub static TEST_MODE: AtomicBool = AtomicBool::new(false);
/// Simulates worker-pool creation failure, to exercise the sequential-fallback path.
pub static RAISE_POOL_EXCEPTION: AtomicBool = AtomicBool::new(false);
/// Simulates a per-task exception, to exercise error-swallowing (every item yields `None`).
pub static RAISE_TASK_EXCEPTION: AtomicBool = AtomicBool::new(false);

pub fn set_test_mode(enabled: bool) {
    TEST_MODE.store(enabled, Ordering::SeqCst);
}

pub fn set_raise_pool_exception(enabled: bool) {
    RAISE_POOL_EXCEPTION.store(enabled, Ordering::SeqCst);
}

pub fn set_raise_task_exception(enabled: bool) {
    RAISE_TASK_EXCEPTION.store(enabled, Ordering::SeqCst);
}

pub fn reset_test_flags() {
    set_test_mode(false);
    set_raise_pool_exception(false);
    set_raise_task_exception(false);
}

/// `max(1, cpus - 2)`, matching the driver's default worker-count formula.
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    cpus.saturating_sub(2).max(1)
}

/// Scatters `items` across a worker pool and gathers results by original index. Falls back to
/// sequential execution when: test mode is set, there are too few items to bother (`<= 4`),
/// the computed worker count is 1, or pool creation fails.
pub fn scatter_gather<T, F, R>(items: &[T], parallel_enabled: bool, f: F) -> Vec<Option<R>>
where
    T: Sync,
    F: Fn(&T) -> R + Sync,
    R: Send,
{
    if !parallel_enabled || TEST_MODE.load(Ordering::SeqCst) || items.len() <= 4 {
        return sequential(items, &f);
    }
    let workers = default_worker_count();
    if workers <= 1 {
        return sequential(items, &f);
    }
    if RAISE_POOL_EXCEPTION.load(Ordering::SeqCst) {
        warn!("worker pool creation failed (simulated); falling back to sequential evaluation");
        return sequential(items, &f);
    }
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| items.par_iter().map(|item| evaluate_one(item, &f)).collect()),
        Err(err) => {
            warn!("worker pool creation failed: {err}; falling back to sequential evaluation");
            sequential(items, &f)
        }
    }
}

fn sequential<T, F, R>(items: &[T], f: &F) -> Vec<Option<R>>
where
    F: Fn(&T) -> R,
{
    items.iter().map(|item| evaluate_one(item, f)).collect()
}

fn evaluate_one<T, F, R>(item: &T, f: &F) -> Option<R>
where
    F: Fn(&T) -> R,
{
    if RAISE_TASK_EXCEPTION.load(Ordering::SeqCst) {
        return None;
    }
    catch_unwind(AssertUnwindSafe(|| f(item))).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_path_preserves_order() {
        reset_test_flags();
        set_test_mode(true);
        let items = vec![1, 2, 3, 4, 5, 6];
        let results = scatter_gather(&items, true, |x| x * 2);
        assert_eq!(results, vec![Some(2), Some(4), Some(6), Some(8), Some(10), Some(12)]);
        reset_test_flags();
    }

    #[test]
    fn task_exception_yields_none_for_every_slot() {
        reset_test_flags();
        set_raise_task_exception(true);
        let items = vec![1, 2, 3];
        let results = scatter_gather(&items, true, |x| x * 2);
        assert_eq!(results, vec![None, None, None]);
        reset_test_flags();
    }

    #[test]
    fn pool_exception_falls_back_to_sequential() {
        reset_test_flags();
        set_raise_pool_exception(true);
        let items = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let results = scatter_gather(&items, true, |x| x + 1);
        assert_eq!(results, vec![Some(2), Some(3), Some(4), Some(5), Some(6), Some(7), Some(8), Some(9)]);
        reset_test_flags();
    }
}
