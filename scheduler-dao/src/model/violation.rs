use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint_name: String,
    pub severity: Severity,
    pub message: String,
    pub class_id: Option<String>,
}

impl ConstraintViolation {
    pub fn new(constraint_name: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        ConstraintViolation {
            constraint_name: constraint_name.into(),
            severity,
            message: message.into(),
            class_id: None,
        }
    }

    pub fn for_class(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }
}

/// Outcome of a single relaxation attempt, attached to response metadata for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaxationResult {
    pub constraint_name: String,
    pub original_level: u8,
    pub applied_level: u8,
    pub success: bool,
    pub message: String,
}
