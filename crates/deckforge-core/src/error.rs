//! Error taxonomy shared by every task.
//!
//! Orchestrators and the generation client return [`TaskError`] and never
//! recover from it. The action boundary in [`crate::action`] is the only
//! place that inspects the [`ErrorKind`] and renders a message.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A single field that failed input validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Wire name of the field, with a path for nested values
    /// (e.g. `previousQueries[2].answer`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Input rejected before it could reach the backend.
///
/// Carries every offending field, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError::new(field, message)],
        }
    }

    /// Names of the offending fields, in the order they were reported.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field.as_str()).collect()
    }

    /// Whether a field with this exact name was reported.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.field == name)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(ToString::to_string).collect();
        write!(f, "invalid input: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Everything that can go wrong while running a task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("generation failed: {0}")]
    GenerationFailure(String),

    #[error("{task} output does not match its schema: {detail}")]
    SchemaViolation { task: &'static str, detail: String },

    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("generation backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("model exceeded the limit of {limit} tool calls")]
    ToolBudgetExceeded { limit: usize },
}

/// Coarse classification of a [`TaskError`], used for logging and for
/// choosing a response status at the HTTP edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    GenerationFailure,
    SchemaViolation,
    BackendUnavailable,
    Timeout,
    ToolBudgetExceeded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::GenerationFailure => "generation_failure",
            Self::SchemaViolation => "schema_violation",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Timeout => "timeout",
            Self::ToolBudgetExceeded => "tool_budget_exceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::GenerationFailure(_) => ErrorKind::GenerationFailure,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ToolBudgetExceeded { .. } => ErrorKind::ToolBudgetExceeded,
        }
    }

    pub fn schema(task: &'static str, detail: impl Into<String>) -> Self {
        Self::SchemaViolation {
            task,
            detail: detail.into(),
        }
    }
}
