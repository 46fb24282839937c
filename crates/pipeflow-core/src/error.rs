//! Error types for the pipeflow core.
//!
//! Task failures are never represented here: they travel as
//! [`FailureSignal`](crate::invoker::FailureSignal) data and are routed by the
//! executor. This module only covers structural problems that stop a run from
//! starting (or, for replay, from being reproduced).

use thiserror::Error;

use crate::definition::ValidationReport;

/// Errors raised by definition loading, validation and execution.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The definition document could not be parsed (YAML or JSON).
    #[error("Parse error: {0}")]
    Parse(String),

    /// The definition parsed but breaks one or more structural rules.
    #[error("Validation error: {0}")]
    Validation(ValidationReport),

    /// A state name could not be resolved against the definition.
    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// Replaying a recorded history did not follow the same path.
    #[error("Replay diverged: {0}")]
    ReplayDivergence(String),

    /// I/O error while reading a definition or history file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Returns true for errors that indicate a broken definition rather than
    /// an environmental problem.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Parse(_) | PipelineError::Validation(_) | PipelineError::UnknownState(_)
        )
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Parse(err.to_string())
    }
}

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;
