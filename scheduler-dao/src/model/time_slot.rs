use serde::{Deserialize, Serialize};

/// A (weekday, period) pair. `day_of_week` is 1-based Monday..Friday, `period` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day_of_week: u8,
    pub period: u8,
}

impl TimeSlot {
    pub const MIN_DAY: u8 = 1;
    pub const MAX_DAY: u8 = 5;
    pub const MIN_PERIOD: u8 = 1;
    pub const MAX_PERIOD: u8 = 8;

    pub fn new(day_of_week: u8, period: u8) -> Self {
        TimeSlot { day_of_week, period }
    }

    pub fn is_valid(&self) -> bool {
        (Self::MIN_DAY..=Self::MAX_DAY).contains(&self.day_of_week) && (Self::MIN_PERIOD..=Self::MAX_PERIOD).contains(&self.period)
    }

    /// True if `other` is the adjacent period on the same day (period difference of exactly 1).
    pub fn is_adjacent(&self, other: &TimeSlot) -> bool {
        self.day_of_week == other.day_of_week && (self.period as i16 - other.period as i16).abs() == 1
    }
}
