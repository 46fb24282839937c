//! Pipeflow core library.
//!
//! A small declarative orchestrator: a pipeline is a named graph of states,
//! each invoking one task, with explicit success transitions and catch rules
//! routing failures by error class.
//!
//! # Modules
//!
//! - `definition` - Document format, validated graph, parser, built-in pipelines
//! - `invoker` - Task invocation boundary and failure signals
//! - `engine` - State machine executor, run reports and replay
//! - `error` - Structural error types

pub mod definition;
pub mod engine;
pub mod error;
pub mod invoker;

pub use definition::{
    load_definition, parse_definition, CatchRule, ErrorMatch, StateSpec, Transition,
    ValidationIssue, ValidationReport, WorkflowDefinition,
};
pub use engine::{
    replay, replay_report, ExecutionContext, ExecutorOptions, HistoryEntry, RunOutcome,
    RunReport, RunStatus, StepOutcome, WorkflowExecutor,
};
pub use error::{PipelineError, PipelineResult};
pub use invoker::{FailureSignal, InvocationContext, ScriptedInvoker, TaskInvoker};
