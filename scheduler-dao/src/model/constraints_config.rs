use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsecutiveClassesRule {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConstraints {
    pub max_classes_per_day: u32,
    pub max_classes_per_week: u32,
    pub min_periods_per_week: u32,
    pub max_consecutive_classes: u32,
    pub consecutive_classes_rule: ConsecutiveClassesRule,
    pub allow_consecutive_classes: bool,
    pub required_break_periods: HashSet<u8>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Default for GlobalConstraints {
    fn default() -> Self {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid default date");
        GlobalConstraints {
            max_classes_per_day: 4,
            max_classes_per_week: 16,
            min_periods_per_week: 1,
            max_consecutive_classes: 2,
            consecutive_classes_rule: ConsecutiveClassesRule::Soft,
            allow_consecutive_classes: true,
            required_break_periods: HashSet::new(),
            start_date: today,
            end_date: today,
        }
    }
}
