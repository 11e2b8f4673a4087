use crate::error::SolveError;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// The fixed set of recognized weight keys (see the objective set table). `update_weights`
/// rejects anything outside this set.
pub const WEIGHT_KEYS: &[&str] = &[
    "required_periods",
    "preferred_periods",
    "avoid_periods",
    "earlier_dates",
    "day_usage",
    "final_week_compression",
    "daily_balance",
    "distribution",
    "grade_grouping",
    "consecutive_soft",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub required_periods: f64,
    pub preferred_periods: f64,
    pub avoid_periods: f64,
    pub earlier_dates: f64,
    pub day_usage: f64,
    pub final_week_compression: f64,
    pub daily_balance: f64,
    pub distribution: f64,
    pub grade_grouping: f64,
    pub consecutive_soft: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        ObjectiveWeights {
            required_periods: 10000.0,
            preferred_periods: 1000.0,
            avoid_periods: -500.0,
            earlier_dates: 10.0,
            day_usage: 2000.0,
            final_week_compression: 3000.0,
            daily_balance: 1500.0,
            distribution: 1000.0,
            grade_grouping: 1200.0,
            consecutive_soft: 100.0,
        }
    }
}

impl ObjectiveWeights {
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "required_periods" => Some(self.required_periods),
            "preferred_periods" => Some(self.preferred_periods),
            "avoid_periods" => Some(self.avoid_periods),
            "earlier_dates" => Some(self.earlier_dates),
            "day_usage" => Some(self.day_usage),
            "final_week_compression" => Some(self.final_week_compression),
            "daily_balance" => Some(self.daily_balance),
            "distribution" => Some(self.distribution),
            "grade_grouping" => Some(self.grade_grouping),
            "consecutive_soft" => Some(self.consecutive_soft),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: f64) -> Result<(), SolveError> {
        match key {
            "required_periods" => self.required_periods = value,
            "preferred_periods" => self.preferred_periods = value,
            "avoid_periods" => self.avoid_periods = value,
            "earlier_dates" => self.earlier_dates = value,
            "day_usage" => self.day_usage = value,
            "final_week_compression" => self.final_week_compression = value,
            "daily_balance" => self.daily_balance = value,
            "distribution" => self.distribution = value,
            "grade_grouping" => self.grade_grouping = value,
            "consecutive_soft" => self.consecutive_soft = value,
            other => {
                return Err(SolveError::validation("weights", format!("unknown weight key '{}'", other)));
            }
        }
        Ok(())
    }

    pub fn as_map(&self) -> HashMap<String, f64> {
        WEIGHT_KEYS.iter().map(|k| (k.to_string(), self.get(k).unwrap())).collect()
    }
}

lazy_static! {
    static ref GLOBAL_WEIGHTS: Mutex<ObjectiveWeights> = Mutex::new(ObjectiveWeights::default());
}

/// The meta-optimizer's best weight set found so far, process-wide. A second singleton
/// alongside `GLOBAL_WEIGHTS`: the weight map is the configuration a solve reads, this is the
/// running record of the best tuning result any meta-optimizer run has produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMetaResult {
    pub weights: ObjectiveWeights,
    pub fitness: f64,
    pub generations_used: u32,
}

lazy_static! {
    static ref GLOBAL_BEST_META_RESULT: Mutex<Option<BestMetaResult>> = Mutex::new(None);
}

/// Clears the recorded best result. Called at the start of a fresh tuning session and by
/// tests that need a clean singleton.
pub fn init_best_meta_result() {
    let mut guard = GLOBAL_BEST_META_RESULT.lock().expect("best-meta-result mutex poisoned");
    *guard = None;
}

/// Replaces the recorded best result only if `candidate` scores higher than (or nothing has
/// been recorded yet against) the current one.
pub fn update_best_meta_result(candidate: BestMetaResult) {
    let mut guard = GLOBAL_BEST_META_RESULT.lock().expect("best-meta-result mutex poisoned");
    let improves = guard.as_ref().map(|current| candidate.fitness > current.fitness).unwrap_or(true);
    if improves {
        *guard = Some(candidate);
    }
}

pub fn read_best_meta_result() -> Option<BestMetaResult> {
    GLOBAL_BEST_META_RESULT.lock().expect("best-meta-result mutex poisoned").clone()
}

pub fn reset_best_meta_result() {
    init_best_meta_result();
}

/// Reads the current global objective weights. Callers must not hold this across a call to
/// `update_weights`/`reset_weights` from another thread while a solve is in flight;
/// administrative updates must be serialized against solves by the caller.
pub fn read_weights() -> ObjectiveWeights {
    *GLOBAL_WEIGHTS.lock().expect("weights mutex poisoned")
}

/// Merges `partial` into the global weight map. Rejects the whole update (no partial effect)
/// if any key is unrecognized.
pub fn update_weights(partial: &HashMap<String, f64>) -> Result<(), SolveError> {
    for key in partial.keys() {
        if !WEIGHT_KEYS.contains(&key.as_str()) {
            return Err(SolveError::validation("weights", format!("unknown weight key '{}'", key)));
        }
    }
    let mut guard = GLOBAL_WEIGHTS.lock().expect("weights mutex poisoned");
    for (key, value) in partial {
        guard.set(key, *value)?;
    }
    Ok(())
}

pub fn reset_weights() {
    let mut guard = GLOBAL_WEIGHTS.lock().expect("weights mutex poisoned");
    *guard = ObjectiveWeights::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_then_reset_round_trips() {
        reset_weights();
        let baseline = read_weights();
        let mut partial = HashMap::new();
        partial.insert("avoid_periods".to_string(), 0.0);
        update_weights(&partial).unwrap();
        let updated = read_weights();
        assert_eq!(updated.avoid_periods, 0.0);
        assert_eq!(updated.required_periods, baseline.required_periods);
        reset_weights();
        assert_eq!(read_weights(), ObjectiveWeights::default());
    }

    #[test]
    fn update_rejects_unknown_key() {
        reset_weights();
        let mut partial = HashMap::new();
        partial.insert("not_a_real_weight".to_string(), 1.0);
        assert!(update_weights(&partial).is_err());
        assert_eq!(read_weights(), ObjectiveWeights::default());
    }

    #[test]
    fn best_meta_result_only_updates_on_improvement() {
        reset_best_meta_result();
        assert!(read_best_meta_result().is_none());
        update_best_meta_result(BestMetaResult { weights: ObjectiveWeights::default(), fitness: 10.0, generations_used: 3 });
        update_best_meta_result(BestMetaResult { weights: ObjectiveWeights::default(), fitness: 5.0, generations_used: 9 });
        assert_eq!(read_best_meta_result().unwrap().fitness, 10.0);
        update_best_meta_result(BestMetaResult { weights: ObjectiveWeights::default(), fitness: 15.0, generations_used: 1 });
        assert_eq!(read_best_meta_result().unwrap().fitness, 15.0);
        reset_best_meta_result();
        assert!(read_best_meta_result().is_none());
    }
}
