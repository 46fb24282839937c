//! Execution engine.
//!
//! - [`WorkflowExecutor`] runs a validated definition against a [`TaskInvoker`](crate::invoker::TaskInvoker)
//! - [`ExecutionContext`] holds the mutable state of one run
//! - [`RunReport`] is what a finished run hands back
//! - [`replay`] re-executes a run from its recorded history

mod context;
mod executor;
mod outcome;
mod playback;

#[cfg(test)]
mod scenarios;

pub use context::{ExecutionContext, HistoryEntry, StepOutcome};
pub use executor::{failure_context, ExecutorOptions, WorkflowExecutor};
pub use outcome::{RunOutcome, RunReport, RunStatus};
pub use playback::{replay, replay_report};
