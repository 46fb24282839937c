//! Per-run execution context.
//!
//! Created fresh for every run and owned exclusively by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::StateSpec;
use crate::invoker::FailureSignal;

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failure,
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Append-only record of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub state: String,
    pub task: String,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Task output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Returns true if the step succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Success)
    }

    /// Step duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// The recorded task outcome, as the invoker returned it.
    pub fn task_outcome(&self) -> Result<serde_json::Value, FailureSignal> {
        match self.outcome {
            StepOutcome::Success => Ok(self.output.clone().unwrap_or_default()),
            StepOutcome::Failure => Err(FailureSignal {
                error_class: self.error_class.clone().unwrap_or_default(),
                cause: self.cause.clone(),
            }),
        }
    }
}

/// Mutable state of one run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub execution_id: Uuid,
    pub current_state: String,
    pub payload: serde_json::Value,
    pub history: Vec<HistoryEntry>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Create a context positioned at `start_state`.
    pub fn new(start_state: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            current_state: start_state.into(),
            payload,
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Record a successful step.
    pub fn record_success(
        &mut self,
        state: &StateSpec,
        output: &serde_json::Value,
        started_at: DateTime<Utc>,
    ) {
        self.history.push(HistoryEntry {
            state: state.name.clone(),
            task: state.task_ref.clone(),
            outcome: StepOutcome::Success,
            error_class: None,
            cause: None,
            output: Some(output.clone()),
            started_at,
            finished_at: Utc::now(),
        });
    }

    /// Record a failed step.
    pub fn record_failure(
        &mut self,
        state: &StateSpec,
        signal: &FailureSignal,
        started_at: DateTime<Utc>,
    ) {
        self.history.push(HistoryEntry {
            state: state.name.clone(),
            task: state.task_ref.clone(),
            outcome: StepOutcome::Failure,
            error_class: Some(signal.error_class.clone()),
            cause: signal.cause.clone(),
            output: None,
            started_at,
            finished_at: Utc::now(),
        });
    }

    /// Names of executed states, in order.
    pub fn visited_states(&self) -> Vec<&str> {
        self.history.iter().map(|h| h.state.as_str()).collect()
    }

    /// Number of executed steps.
    pub fn step_count(&self) -> usize {
        self.history.len()
    }
}
