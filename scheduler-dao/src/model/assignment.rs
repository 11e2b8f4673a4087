use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A concrete (class, date, period) placement, the unit of solver output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub class_id: String,
    pub date: NaiveDate,
    pub day_of_week: u8,
    pub period: u8,
}

impl Assignment {
    pub fn new(class_id: impl Into<String>, date: NaiveDate, day_of_week: u8, period: u8) -> Self {
        Assignment {
            class_id: class_id.into(),
            date,
            day_of_week,
            period,
        }
    }

    /// UTC ISO-8601 with a trailing `Z`, e.g. `2025-03-04T00:00:00Z`.
    pub fn date_rfc3339(&self) -> String {
        format!("{}T00:00:00Z", self.date.format("%Y-%m-%d"))
    }
}
