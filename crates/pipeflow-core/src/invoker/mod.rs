//! Task invocation boundary.
//!
//! The executor never talks to extract/transform/load/notify collaborators
//! directly: every call goes through a [`TaskInvoker`]. An invoker returns
//! either the task's output payload or a [`FailureSignal`]; it never panics
//! through to the executor, so catch rules can be applied uniformly.

mod scripted;

pub use scripted::{InvocationRecord, ScriptedInvoker};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Well-known error classes.
pub mod error_class {
    /// Catch-all pattern accepted in `errorEquals`.
    pub const ALL: &str = "States.ALL";
    /// Short alias for [`ALL`].
    pub const WILDCARD: &str = "*";
    /// A failure the invoker could not classify.
    pub const UNHANDLED: &str = "unhandled";
    /// A step or run deadline elapsed.
    pub const TIMEOUT: &str = "timeout";
    /// The run was cancelled by its caller.
    pub const CANCELLED: &str = "cancelled";
    /// The task reference is not known to the invoker.
    pub const TASK_NOT_FOUND: &str = "task_not_found";
}

/// Classified task failure, carried as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error_class}: {}", .cause.as_deref().unwrap_or("no cause given"))]
pub struct FailureSignal {
    /// Class used by catch-rule matching.
    pub error_class: String,

    /// Human-readable cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl FailureSignal {
    /// Create a failure of the given class.
    pub fn new(error_class: impl Into<String>) -> Self {
        Self {
            error_class: error_class.into(),
            cause: None,
        }
    }

    /// Attach a cause.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Failure the invoker could not classify.
    pub fn unhandled(cause: impl Into<String>) -> Self {
        Self::new(error_class::UNHANDLED).with_cause(cause)
    }

    /// Deadline expiry.
    pub fn timeout(cause: impl Into<String>) -> Self {
        Self::new(error_class::TIMEOUT).with_cause(cause)
    }

    /// Caller cancellation.
    pub fn cancelled(cause: impl Into<String>) -> Self {
        Self::new(error_class::CANCELLED).with_cause(cause)
    }

    /// Unknown task reference.
    pub fn task_not_found(task_ref: &str) -> Self {
        Self::new(error_class::TASK_NOT_FOUND)
            .with_cause(format!("No task registered for reference '{}'", task_ref))
    }
}

/// Per-invocation metadata handed to the invoker.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Run identifier.
    pub execution_id: Uuid,

    /// Pipeline name.
    pub pipeline: String,

    /// State whose task is being invoked.
    pub state: String,

    /// Cancelled when the caller cancels the run. Steps that start after the
    /// interrupted one receive a fresh token.
    pub cancellation: CancellationToken,
}

impl InvocationContext {
    /// Create a context for one invocation.
    pub fn new(
        execution_id: Uuid,
        pipeline: impl Into<String>,
        state: impl Into<String>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            execution_id,
            pipeline: pipeline.into(),
            state: state.into(),
            cancellation,
        }
    }
}

/// Resolves a task reference and runs it with a payload.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    /// Run `task_ref` with `payload`.
    ///
    /// Every outcome, including internal faults, must come back as data.
    async fn invoke(
        &self,
        task_ref: &str,
        payload: serde_json::Value,
        ctx: &InvocationContext,
    ) -> Result<serde_json::Value, FailureSignal>;
}
