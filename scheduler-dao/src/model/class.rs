use crate::model::time_slot::TimeSlot;
use serde::{Deserialize, Serialize};

/// Per-class soft/hard slot preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklySchedule {
    /// Slots the class must never be assigned to.
    pub conflicts: Vec<TimeSlot>,
    /// If non-empty, the class's single assignment must land on one of these slots.
    pub required_periods: Vec<TimeSlot>,
    /// Slots that earn a bonus when chosen.
    pub preferred_periods: Vec<TimeSlot>,
    /// Slots that incur a penalty when chosen.
    pub avoid_periods: Vec<TimeSlot>,
    pub preference_weight: f64,
    pub avoidance_weight: f64,
}

impl WeeklySchedule {
    pub fn has_required_periods(&self) -> bool {
        !self.required_periods.is_empty()
    }

    pub fn is_conflict(&self, slot: &TimeSlot) -> bool {
        self.conflicts.contains(slot)
    }

    pub fn is_required(&self, slot: &TimeSlot) -> bool {
        self.required_periods.contains(slot)
    }

    pub fn is_preferred(&self, slot: &TimeSlot) -> bool {
        self.preferred_periods.contains(slot)
    }

    pub fn is_avoided(&self, slot: &TimeSlot) -> bool {
        self.avoid_periods.contains(slot)
    }
}

/// Derives the numeric grade group (0..=6) for a grade label when one is not supplied explicitly.
/// Mirrors the fixed map {Pre-K -> 0, K -> 1, 1 -> 2, ..., 5 -> 6}.
pub fn grade_group_from_label(grade: &str) -> u8 {
    match grade.trim().to_ascii_lowercase().as_str() {
        "pre-k" | "prek" | "pre-kindergarten" => 0,
        "k" | "kindergarten" => 1,
        other => other.parse::<u8>().map(|n| n + 1).unwrap_or(0),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub name: String,
    pub grade: String,
    /// Wire-optional: derived from `grade` via [`grade_group_from_label`] when the request
    /// omits it (see [`Class::deserialize`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_group: Option<u8>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub weekly_schedule: WeeklySchedule,
}

impl Class {
    pub fn new(id: impl Into<String>, name: impl Into<String>, grade: impl Into<String>, weekly_schedule: WeeklySchedule) -> Self {
        let grade = grade.into();
        let grade_group = Some(grade_group_from_label(&grade));
        Class {
            id: id.into(),
            name: name.into(),
            grade,
            grade_group,
            equipment: Vec::new(),
            weekly_schedule,
        }
    }

    /// The effective numeric grade group: the wire value if present, otherwise derived from
    /// `grade` via the fixed label map.
    pub fn effective_grade_group(&self) -> u8 {
        self.grade_group.unwrap_or_else(|| grade_group_from_label(&self.grade))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_labels_map_to_the_fixed_table() {
        assert_eq!(grade_group_from_label("Pre-K"), 0);
        assert_eq!(grade_group_from_label("K"), 1);
        assert_eq!(grade_group_from_label("1"), 2);
        assert_eq!(grade_group_from_label("4"), 5);
        assert_eq!(grade_group_from_label("5"), 6);
    }

    #[test]
    fn unparseable_grade_label_defaults_to_zero() {
        assert_eq!(grade_group_from_label("not-a-grade"), 0);
    }
}
