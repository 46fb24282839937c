//! Run status and terminal outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::HistoryEntry;

/// Status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run reached a terminal state successfully.
    Succeeded,
    /// Run ended on an unhandled failure.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The last executed state was terminal and its task succeeded.
    Succeeded { payload: serde_json::Value },

    /// A task failed and no catch rule of its state matched.
    Failed {
        state: String,
        error_class: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl RunOutcome {
    /// Status of this outcome.
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Succeeded { .. } => RunStatus::Succeeded,
            Self::Failed { .. } => RunStatus::Failed,
        }
    }

    /// Returns true for `Succeeded`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Final payload of a successful run.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Succeeded { payload } => Some(payload),
            Self::Failed { .. } => None,
        }
    }

    /// Process exit code for command-line drivers.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Succeeded { .. } => 0,
            Self::Failed { .. } => 1,
        }
    }
}

/// Everything a caller needs to log, persist or act on a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub execution_id: Uuid,
    pub pipeline: String,
    pub input: serde_json::Value,
    pub outcome: RunOutcome,
    pub history: Vec<HistoryEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Names of executed states, in order.
    pub fn visited_states(&self) -> Vec<&str> {
        self.history.iter().map(|h| h.state.as_str()).collect()
    }

    /// Run duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
