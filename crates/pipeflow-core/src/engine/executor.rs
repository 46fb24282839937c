//! Workflow executor.
//!
//! Walks a validated definition from its start state, one state at a time:
//! - resolves the current state
//! - invokes its task through the [`TaskInvoker`] and waits for the result
//! - on success follows `next` (or stops with `Succeeded`)
//! - on failure follows the first matching catch rule with a failure-context
//!   payload (or stops with `Failed`)
//!
//! The executor never retries a task. It holds no per-run state, so one
//! instance can serve any number of concurrent runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::ExecutionContext;
use super::outcome::{RunOutcome, RunReport};
use crate::definition::{StateSpec, Transition, WorkflowDefinition};
use crate::error::PipelineResult;
use crate::invoker::{FailureSignal, InvocationContext, TaskInvoker};

/// Executor limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Default step timeout; a state's own `timeoutSeconds` takes precedence.
    pub step_timeout: Option<Duration>,

    /// Deadline for the whole run.
    pub run_timeout: Option<Duration>,
}

impl ExecutorOptions {
    /// Set the default step timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Set the run deadline.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }
}

/// Cancellation and run deadline, delivered to at most one step.
struct Interrupts {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    delivered: bool,
}

impl Interrupts {
    /// Token for the next invocation; fresh once an interrupt was delivered.
    fn token(&self) -> CancellationToken {
        if self.delivered {
            CancellationToken::new()
        } else {
            self.cancellation.clone()
        }
    }
}

/// State machine executor.
#[derive(Clone)]
pub struct WorkflowExecutor {
    definition: Arc<WorkflowDefinition>,
    invoker: Arc<dyn TaskInvoker>,
    options: ExecutorOptions,
}

impl WorkflowExecutor {
    /// Create an executor for a validated definition.
    pub fn new(definition: Arc<WorkflowDefinition>, invoker: Arc<dyn TaskInvoker>) -> Self {
        Self {
            definition,
            invoker,
            options: ExecutorOptions::default(),
        }
    }

    /// Set executor limits.
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the definition.
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Get the executor limits.
    pub fn options(&self) -> ExecutorOptions {
        self.options
    }

    /// Execute one run to completion.
    pub async fn run(&self, payload: Value) -> PipelineResult<RunReport> {
        self.run_with_cancellation(payload, CancellationToken::new())
            .await
    }

    /// Execute one run to completion, honouring `cancellation`.
    ///
    /// Returns `Err` only for structural errors (an unresolvable state);
    /// every task failure ends in a [`RunOutcome`].
    pub async fn run_with_cancellation(
        &self,
        payload: Value,
        cancellation: CancellationToken,
    ) -> PipelineResult<RunReport> {
        let definition = &self.definition;
        let input = payload.clone();
        let mut ctx = ExecutionContext::new(definition.start_state(), payload);
        let mut interrupts = Interrupts {
            cancellation,
            deadline: self.options.run_timeout.map(|t| Instant::now() + t),
            delivered: false,
        };
        let run_timer = std::time::Instant::now();

        info!(
            execution_id = %ctx.execution_id,
            pipeline = %definition.name(),
            start = %ctx.current_state,
            "Pipeline run started"
        );

        let outcome = loop {
            let state = definition.resolve(&ctx.current_state)?;
            let started_at = Utc::now();
            let step_timer = std::time::Instant::now();
            let step_input = std::mem::take(&mut ctx.payload);

            debug!(
                execution_id = %ctx.execution_id,
                state = %state.name,
                task = %state.task_ref,
                "Entering state"
            );

            let invocation = InvocationContext::new(
                ctx.execution_id,
                definition.name(),
                state.name.clone(),
                interrupts.token(),
            );
            let result = self
                .invoke_step(state, step_input, &invocation, &mut interrupts)
                .await;
            let duration_ms = step_timer.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    ctx.record_success(state, &output, started_at);
                    match &state.transition {
                        Transition::Next(next) => {
                            debug!(
                                execution_id = %ctx.execution_id,
                                state = %state.name,
                                next = %next,
                                duration_ms,
                                "State succeeded"
                            );
                            ctx.current_state = next.clone();
                            ctx.payload = output;
                        }
                        Transition::End => {
                            debug!(
                                execution_id = %ctx.execution_id,
                                state = %state.name,
                                duration_ms,
                                "Terminal state succeeded"
                            );
                            break RunOutcome::Succeeded { payload: output };
                        }
                    }
                }
                Err(signal) => {
                    ctx.record_failure(state, &signal, started_at);
                    match state.find_catch(&signal.error_class) {
                        Some(rule) => {
                            warn!(
                                execution_id = %ctx.execution_id,
                                state = %state.name,
                                error_class = %signal.error_class,
                                target = %rule.target,
                                duration_ms,
                                "State failed, routing to catch target"
                            );
                            ctx.payload =
                                failure_context(definition.name(), ctx.execution_id, state, &signal);
                            ctx.current_state = rule.target.clone();
                        }
                        None => {
                            warn!(
                                execution_id = %ctx.execution_id,
                                state = %state.name,
                                error_class = %signal.error_class,
                                cause = ?signal.cause,
                                duration_ms,
                                "State failed with no matching catch rule"
                            );
                            break RunOutcome::Failed {
                                state: state.name.clone(),
                                error_class: signal.error_class,
                                cause: signal.cause,
                            };
                        }
                    }
                }
            }
        };

        info!(
            execution_id = %ctx.execution_id,
            pipeline = %definition.name(),
            status = %outcome.status(),
            steps = ctx.step_count(),
            duration_ms = run_timer.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );

        Ok(RunReport {
            execution_id: ctx.execution_id,
            pipeline: definition.name().to_string(),
            input,
            outcome,
            history: ctx.history,
            started_at: ctx.started_at,
            finished_at: Utc::now(),
        })
    }

    /// Invoke one task, applying the step timeout and any pending interrupt.
    async fn invoke_step(
        &self,
        state: &StateSpec,
        input: Value,
        invocation: &InvocationContext,
        interrupts: &mut Interrupts,
    ) -> Result<Value, FailureSignal> {
        let step_timeout = state.timeout.or(self.options.step_timeout);
        let call = async {
            let fut = self.invoker.invoke(&state.task_ref, input, invocation);
            match step_timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                    Err(FailureSignal::timeout(format!(
                        "State '{}' exceeded its step timeout of {:?}",
                        state.name, limit
                    )))
                }),
                None => fut.await,
            }
        };

        if interrupts.delivered {
            return call.await;
        }

        if interrupts.cancellation.is_cancelled() {
            interrupts.delivered = true;
            return Err(FailureSignal::cancelled(format!(
                "Run cancelled before state '{}' started",
                state.name
            )));
        }

        if interrupts.deadline.is_some_and(|at| Instant::now() >= at) {
            interrupts.delivered = true;
            return Err(FailureSignal::timeout(format!(
                "Run deadline elapsed before state '{}' started",
                state.name
            )));
        }

        let deadline = interrupts.deadline;
        let run_deadline = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancellation = interrupts.cancellation.clone();

        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                interrupts.delivered = true;
                Err(FailureSignal::cancelled(format!(
                    "Run cancelled while state '{}' was running",
                    state.name
                )))
            }
            _ = run_deadline => {
                interrupts.delivered = true;
                Err(FailureSignal::timeout(format!(
                    "Run deadline elapsed while state '{}' was running",
                    state.name
                )))
            }
            result = call => result,
        }
    }
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("pipeline", &self.definition.name())
            .field("options", &self.options)
            .finish()
    }
}

/// Payload handed to a catch target in place of the failed state's input.
pub fn failure_context(
    pipeline: &str,
    execution_id: Uuid,
    state: &StateSpec,
    signal: &FailureSignal,
) -> Value {
    json!({
        "error": signal.error_class,
        "cause": signal.cause,
        "failed_state": state.name,
        "task": state.task_ref,
        "pipeline": pipeline,
        "execution_id": execution_id.to_string(),
    })
}
