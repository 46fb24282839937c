//! Deterministic replay of recorded runs.
//!
//! Replay drives the regular executor with an invoker that answers each call
//! from a recorded history instead of running the task. Given the same
//! definition, input and history, the executor takes the same transitions
//! and produces the same outcome.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::context::HistoryEntry;
use super::executor::WorkflowExecutor;
use super::outcome::RunReport;
use crate::definition::WorkflowDefinition;
use crate::error::{PipelineError, PipelineResult};
use crate::invoker::{FailureSignal, InvocationContext, TaskInvoker};

const REPLAY_DIVERGENCE: &str = "replay_divergence";

/// Invoker answering from a recorded history.
#[derive(Debug)]
struct HistoryInvoker {
    entries: Mutex<VecDeque<HistoryEntry>>,
    divergence: Mutex<Option<String>>,
}

impl HistoryInvoker {
    fn new(history: &[HistoryEntry]) -> Self {
        Self {
            entries: Mutex::new(history.iter().cloned().collect()),
            divergence: Mutex::new(None),
        }
    }

    fn diverge(&self, reason: String) -> FailureSignal {
        let mut divergence = lock(&self.divergence);
        if divergence.is_none() {
            *divergence = Some(reason.clone());
        }
        FailureSignal::new(REPLAY_DIVERGENCE).with_cause(reason)
    }

    fn remaining(&self) -> usize {
        lock(&self.entries).len()
    }

    fn divergence(&self) -> Option<String> {
        lock(&self.divergence).clone()
    }
}

#[async_trait]
impl TaskInvoker for HistoryInvoker {
    async fn invoke(
        &self,
        task_ref: &str,
        _payload: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, FailureSignal> {
        let entry = lock(&self.entries).pop_front();
        let Some(entry) = entry else {
            return Err(self.diverge(format!(
                "History exhausted before state '{}'",
                ctx.state
            )));
        };

        if entry.state != ctx.state || entry.task != task_ref {
            return Err(self.diverge(format!(
                "Expected state '{}' (task '{}'), history recorded state '{}' (task '{}')",
                ctx.state, task_ref, entry.state, entry.task
            )));
        }

        debug!(state = %entry.state, outcome = %entry.outcome, "Replaying recorded step");
        entry.task_outcome()
    }
}

/// Re-execute `definition` against a recorded history.
///
/// Fails with [`PipelineError::ReplayDivergence`] if the executor asks for a
/// step the history does not hold, or finishes with steps left over.
pub async fn replay(
    definition: Arc<WorkflowDefinition>,
    input: Value,
    history: &[HistoryEntry],
) -> PipelineResult<RunReport> {
    let invoker = Arc::new(HistoryInvoker::new(history));
    let executor = WorkflowExecutor::new(definition, invoker.clone());

    info!(
        pipeline = %executor.definition().name(),
        steps = history.len(),
        "Replaying run"
    );

    let report = executor.run(input).await?;

    if let Some(reason) = invoker.divergence() {
        return Err(PipelineError::ReplayDivergence(reason));
    }

    let remaining = invoker.remaining();
    if remaining > 0 {
        return Err(PipelineError::ReplayDivergence(format!(
            "Run finished with {} recorded step(s) not replayed",
            remaining
        )));
    }

    Ok(report)
}

/// Replay a finished run from its report.
pub async fn replay_report(
    definition: Arc<WorkflowDefinition>,
    report: &RunReport,
) -> PipelineResult<RunReport> {
    replay(definition, report.input.clone(), &report.history).await
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
