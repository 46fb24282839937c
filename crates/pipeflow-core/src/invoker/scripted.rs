//! Scripted task invoker.
//!
//! Returns pre-programmed outcomes per task reference and records every call,
//! so the state machine can be exercised without any external I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{FailureSignal, InvocationContext, TaskInvoker};

type Outcome = Result<Value, FailureSignal>;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub task_ref: String,
    pub state: String,
    pub payload: Value,
    /// Whether the invocation's cancellation token was already cancelled.
    pub cancelled: bool,
}

/// Invoker returning scripted outcomes.
///
/// Lookup order for a task reference: queued one-shot outcomes, then the
/// standing response, then pass-through (the input payload is returned as
/// the output).
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    standing: HashMap<String, Outcome>,
    latency: HashMap<String, Duration>,
    queued: Mutex<HashMap<String, VecDeque<Outcome>>>,
    calls: Mutex<Vec<InvocationRecord>>,
}

impl ScriptedInvoker {
    /// Create an invoker that passes every payload through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `task_ref` with `outcome`.
    pub fn respond(mut self, task_ref: impl Into<String>, outcome: Outcome) -> Self {
        self.standing.insert(task_ref.into(), outcome);
        self
    }

    /// Answer every call to `task_ref` with a success.
    pub fn succeed(self, task_ref: impl Into<String>, output: Value) -> Self {
        self.respond(task_ref, Ok(output))
    }

    /// Answer every call to `task_ref` with a failure.
    pub fn fail(self, task_ref: impl Into<String>, signal: FailureSignal) -> Self {
        self.respond(task_ref, Err(signal))
    }

    /// Delay every call to `task_ref`.
    pub fn with_latency(mut self, task_ref: impl Into<String>, latency: Duration) -> Self {
        self.latency.insert(task_ref.into(), latency);
        self
    }

    /// Queue a one-shot outcome for the next call to `task_ref`.
    pub fn push(&self, task_ref: impl Into<String>, outcome: Outcome) {
        lock(&self.queued)
            .entry(task_ref.into())
            .or_default()
            .push_back(outcome);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<InvocationRecord> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Task references of recorded calls, in order.
    pub fn invoked_tasks(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.task_ref.clone()).collect()
    }

    fn next_outcome(&self, task_ref: &str, payload: Value) -> Outcome {
        if let Some(outcome) = lock(&self.queued)
            .get_mut(task_ref)
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }

        match self.standing.get(task_ref) {
            Some(outcome) => outcome.clone(),
            None => Ok(payload),
        }
    }
}

#[async_trait]
impl TaskInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        task_ref: &str,
        payload: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, FailureSignal> {
        lock(&self.calls).push(InvocationRecord {
            task_ref: task_ref.to_string(),
            state: ctx.state.clone(),
            payload: payload.clone(),
            cancelled: ctx.cancellation.is_cancelled(),
        });

        if let Some(latency) = self.latency.get(task_ref) {
            tokio::time::sleep(*latency).await;
        }

        self.next_outcome(task_ref, payload)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn ctx(state: &str) -> InvocationContext {
        InvocationContext::new(Uuid::new_v4(), "test", state, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_pass_through_by_default() {
        let invoker = ScriptedInvoker::new();
        let out = invoker
            .invoke("extract", json!({"key": "a.csv"}), &ctx("extract"))
            .await
            .unwrap();
        assert_eq!(out, json!({"key": "a.csv"}));
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn test_queued_outcomes_before_standing() {
        let invoker = ScriptedInvoker::new().succeed("load", json!({"message": "written"}));
        invoker.push("load", Err(FailureSignal::new("storage_unreachable")));

        let first = invoker.invoke("load", json!({}), &ctx("load")).await;
        assert_eq!(first.unwrap_err().error_class, "storage_unreachable");

        let second = invoker.invoke("load", json!({}), &ctx("load")).await;
        assert_eq!(second.unwrap(), json!({"message": "written"}));
    }

    #[tokio::test]
    async fn test_records_calls() {
        let invoker = ScriptedInvoker::new().fail("transform", FailureSignal::unhandled("boom"));

        let _ = invoker.invoke("extract", json!(1), &ctx("extract")).await;
        let _ = invoker.invoke("transform", json!(2), &ctx("transform")).await;

        assert_eq!(invoker.invoked_tasks(), vec!["extract", "transform"]);
        let calls = invoker.calls();
        assert_eq!(calls[1].state, "transform");
        assert_eq!(calls[1].payload, json!(2));
    }
}
