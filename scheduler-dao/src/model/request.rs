use crate::model::assignment::Assignment;
use crate::model::availability::InstructorUnavailability;
use crate::model::class::Class;
use crate::model::constraints_config::GlobalConstraints;
use crate::model::violation::{ConstraintViolation, RelaxationResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub classes: Vec<Class>,
    /// Accepts either `instructorAvailability` or the synonym `teacherAvailability`.
    #[serde(alias = "teacherAvailability")]
    pub instructor_availability: Vec<InstructorUnavailability>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub constraints: GlobalConstraints,
    /// Free-form configuration surface (see solver configuration options); validated on use.
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

/// Wire-shaped assignment, carrying the class display name alongside the raw placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentView {
    pub name: String,
    pub class_id: String,
    /// UTC ISO-8601 with trailing `Z`.
    pub date: String,
    pub time_slot: TimeSlotView,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeSlotView {
    pub day_of_week: u8,
    pub period: u8,
}

impl AssignmentView {
    pub fn from_assignment(assignment: &Assignment, class_name: &str) -> Self {
        AssignmentView {
            name: class_name.to_string(),
            class_id: assignment.class_id.clone(),
            date: assignment.date_rfc3339(),
            time_slot: TimeSlotView {
                day_of_week: assignment.day_of_week,
                period: assignment.period,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveMetadata {
    pub duration_ms: u64,
    pub solutions_found: u32,
    pub score: i64,
    pub gap: f64,
    pub distribution: Option<HashMap<String, f64>>,
    pub solver: String,
    pub error: Option<String>,
    pub relaxation_level: Option<u8>,
    pub relaxation_status: Option<Vec<RelaxationResult>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub assignments: Vec<AssignmentView>,
    pub metadata: SolveMetadata,
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
}

impl ScheduleResponse {
    pub fn empty(solver: impl Into<String>) -> Self {
        ScheduleResponse {
            assignments: Vec::new(),
            metadata: SolveMetadata {
                solver: solver.into(),
                ..Default::default()
            },
            violations: Vec::new(),
        }
    }
}
