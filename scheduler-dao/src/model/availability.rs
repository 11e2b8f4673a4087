use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Instructor (or "teacher") unavailability on a concrete calendar date.
///
/// The source data occasionally names this field `teacherAvailability` instead of
/// `instructorAvailability`; both are accepted as synonyms on the wire (see request
/// deserialization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorUnavailability {
    pub date: NaiveDate,
    /// Periods forbidden specifically on `date`.
    pub periods: HashSet<u8>,
    /// (day_of_week, period) pairs forbidden whenever they fall on `date`.
    pub unavailable_slots: HashSet<(u8, u8)>,
}

impl InstructorUnavailability {
    pub fn forbids(&self, date: NaiveDate, day_of_week: u8, period: u8) -> bool {
        if date != self.date {
            return false;
        }
        self.periods.contains(&period) || self.unavailable_slots.contains(&(day_of_week, period))
    }
}
