//! Task error types and their failure classes.

use pipeflow_core::FailureSignal;
use thiserror::Error;

/// Error classes produced by the built-in tasks.
pub mod error_class {
    pub const INVALID_PAYLOAD: &str = "invalid_payload";
    pub const OBJECT_NOT_FOUND: &str = "object_not_found";
    pub const STORAGE_UNREACHABLE: &str = "storage_unreachable";
    pub const MALFORMED_RECORD: &str = "malformed_record";
    pub const NOTIFICATION_FAILED: &str = "notification_failed";
    pub const CONFIGURATION: &str = "configuration_error";
}

/// Errors that can occur during task execution.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The input payload is missing a field or has the wrong shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The requested object does not exist.
    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// The object store could not be read or written.
    #[error("Storage unreachable: {0}")]
    Storage(String),

    /// A record could not be parsed or rendered.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(String),

    /// Notification delivery failed.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TaskError {
    /// Error class used by catch-rule matching.
    pub fn error_class(&self) -> &'static str {
        match self {
            TaskError::InvalidPayload(_) => error_class::INVALID_PAYLOAD,
            TaskError::ObjectNotFound { .. } => error_class::OBJECT_NOT_FOUND,
            TaskError::Storage(_) => error_class::STORAGE_UNREACHABLE,
            TaskError::MalformedRecord(_) => error_class::MALFORMED_RECORD,
            TaskError::Template(_) | TaskError::Notification(_) => {
                error_class::NOTIFICATION_FAILED
            }
            TaskError::Configuration(_) => error_class::CONFIGURATION,
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(e: std::io::Error) -> Self {
        TaskError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::InvalidPayload(e.to_string())
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(e: reqwest::Error) -> Self {
        TaskError::Notification(e.to_string())
    }
}

impl From<minijinja::Error> for TaskError {
    fn from(e: minijinja::Error) -> Self {
        TaskError::Template(e.to_string())
    }
}

impl From<TaskError> for FailureSignal {
    fn from(e: TaskError) -> Self {
        FailureSignal::new(e.error_class()).with_cause(e.to_string())
    }
}
