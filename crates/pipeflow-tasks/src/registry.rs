//! Task registry and dispatch.
//!
//! [`TaskRegistry`] is the production [`TaskInvoker`]: it maps task
//! references to [`Task`] implementations and turns every outcome, including
//! panics, into data for the executor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pipeflow_core::{FailureSignal, InvocationContext, TaskInvoker};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::TaskError;

/// Task trait for implementing pipeline stages.
#[async_trait]
pub trait Task: Send + Sync {
    /// Returns the task's reference name.
    fn name(&self) -> &'static str;

    /// Execute the task with the current payload.
    async fn execute(&self, payload: Value, ctx: &InvocationContext) -> Result<Value, TaskError>;
}

/// Registry of available tasks.
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Register a task under its own name.
    pub fn register<T: Task + 'static>(&mut self, task: T) {
        let name = task.name().to_string();
        self.tasks.insert(name, Arc::new(task));
    }

    /// Register a task under another reference.
    pub fn register_as(&mut self, task_ref: impl Into<String>, task: Arc<dyn Task>) {
        self.tasks.insert(task_ref.into(), task);
    }

    /// Get a task by reference.
    pub fn get(&self, task_ref: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_ref).cloned()
    }

    /// Check if a task is registered.
    pub fn has(&self, task_ref: &str) -> bool {
        self.tasks.contains_key(task_ref)
    }

    /// All registered references, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.list())
            .finish()
    }
}

/// Aborts the spawned task if the invocation is dropped (timeout, cancellation).
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl TaskInvoker for TaskRegistry {
    async fn invoke(
        &self,
        task_ref: &str,
        payload: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, FailureSignal> {
        let Some(task) = self.get(task_ref) else {
            warn!(task = %task_ref, state = %ctx.state, "Task not registered");
            return Err(FailureSignal::task_not_found(task_ref));
        };

        let start = Instant::now();
        let task_ctx = ctx.clone();
        let mut handle = AbortOnDrop(tokio::spawn(async move {
            task.execute(payload, &task_ctx).await
        }));

        let result = match (&mut handle.0).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                warn!(
                    task = %task_ref,
                    state = %ctx.state,
                    error_class = e.error_class(),
                    error = %e,
                    "Task failed"
                );
                Err(FailureSignal::from(e))
            }
            Err(join_error) if join_error.is_panic() => {
                error!(task = %task_ref, state = %ctx.state, "Task panicked");
                Err(FailureSignal::unhandled(format!("Task '{}' panicked", task_ref)))
            }
            Err(join_error) => Err(FailureSignal::unhandled(format!(
                "Task '{}' did not complete: {}",
                task_ref, join_error
            ))),
        };

        debug!(
            task = %task_ref,
            duration_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Task finished"
        );
        result
    }
}
