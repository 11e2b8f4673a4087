use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed error taxonomy for the solve pipeline. Validation and infeasible-grid
/// errors are never recovered from; no-solution and timeout still carry whatever
/// best-so-far schedule the driver managed to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SolveError {
    ValidationError { field: String, reason: String },
    InfeasibleGrid { class_id: String },
    NoSolution,
    Timeout,
    InternalError { message: String },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::ValidationError { field, reason } => write!(f, "validation error on '{}': {}", field, reason),
            SolveError::InfeasibleGrid { class_id } => write!(f, "class '{}' has no reachable required slot within the horizon", class_id),
            SolveError::NoSolution => write!(f, "no feasible solution found within the time budget"),
            SolveError::Timeout => write!(f, "solve timed out"),
            SolveError::InternalError { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for SolveError {}

impl SolveError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SolveError::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
