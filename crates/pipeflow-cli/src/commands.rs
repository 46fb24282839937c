//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pipeflow_core::definition::parse_definition;
use pipeflow_core::{
    load_definition, replay_report, ExecutorOptions, PipelineError, PipelineResult, RunOutcome,
    RunReport, StepOutcome, WorkflowDefinition, WorkflowExecutor,
};
use pipeflow_tasks::{create_default_registry, TasksConfig};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit code for a broken definition.
pub const EXIT_DEFINITION_ERROR: u8 = 2;

pub struct RunArgs {
    pub definition: Option<PathBuf>,
    pub payload: Option<String>,
    pub input: Option<PathBuf>,
    pub step_timeout: Option<u64>,
    pub run_timeout: Option<u64>,
    pub report: Option<PathBuf>,
    pub json: bool,
}

/// `pipeflow run`
pub async fn run(args: RunArgs) -> Result<u8> {
    let definition = Arc::new(load(args.definition.as_deref())?);
    let payload = read_payload(args.payload.as_deref(), args.input.as_deref())?;
    let options = executor_options(args.step_timeout, args.run_timeout);

    let config = TasksConfig::from_env()?;
    let registry = create_default_registry(&config).context("Failed to build task registry")?;
    let executor = WorkflowExecutor::new(definition, Arc::new(registry)).with_options(options);

    // Ctrl-C cancels the run; the failure branch still executes.
    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let report = executor.run_with_cancellation(payload, token).await?;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        info!(path = %path.display(), "Run report written");
    }
    print_report(&report, args.json)?;

    Ok(report.outcome.exit_code())
}

/// `pipeflow validate`
pub fn validate(path: &Path) -> Result<u8> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match parse_definition(&content) {
        Ok(definition) => {
            println!(
                "{}: valid pipeline '{}' ({} states, starts at {})",
                path.display(),
                definition.name(),
                definition.len(),
                definition.start_state()
            );
            Ok(0)
        }
        Err(PipelineError::Validation(report)) => {
            println!("{}: invalid", path.display());
            for issue in report.issues() {
                println!("  - {}", issue);
            }
            Ok(EXIT_DEFINITION_ERROR)
        }
        Err(e) => Err(e.into()),
    }
}

/// `pipeflow show`
pub fn show(path: Option<&Path>) -> Result<u8> {
    let definition = load(path)?;
    print!("{}", render_definition(&definition)?);
    Ok(0)
}

/// `pipeflow replay`
pub async fn replay(history: &Path, definition: Option<&Path>, json: bool) -> Result<u8> {
    let recorded = read_report(history)?;
    let definition = Arc::new(load(definition)?);

    if definition.name() != recorded.pipeline {
        bail!(
            "Report is for pipeline '{}' but the definition is '{}'",
            recorded.pipeline,
            definition.name()
        );
    }

    let replayed = replay_report(definition, &recorded).await?;
    if replayed.outcome != recorded.outcome {
        bail!(
            "Replay outcome differs: recorded {}, replayed {}",
            describe_outcome(&recorded.outcome),
            describe_outcome(&replayed.outcome)
        );
    }

    print_report(&replayed, json)?;
    if !json {
        println!("Replay matched the recorded outcome ({} steps)", replayed.history.len());
    }
    Ok(0)
}

fn load(path: Option<&Path>) -> PipelineResult<WorkflowDefinition> {
    match path {
        Some(path) => load_definition(path),
        None => WorkflowDefinition::canonical(),
    }
}

fn read_payload(inline: Option<&str>, file: Option<&Path>) -> Result<Value> {
    if let Some(raw) = inline {
        return serde_json::from_str(raw).context("--payload is not valid JSON");
    }
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()));
    }
    Ok(Value::Object(Default::default()))
}

fn executor_options(step_timeout: Option<u64>, run_timeout: Option<u64>) -> ExecutorOptions {
    ExecutorOptions {
        step_timeout: step_timeout.map(Duration::from_secs),
        run_timeout: run_timeout.map(Duration::from_secs),
    }
}

fn render_definition(definition: &WorkflowDefinition) -> Result<String> {
    Ok(serde_yaml::to_string(&definition.to_document())?)
}

fn read_report(path: &Path) -> Result<RunReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a run report", path.display()))
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", summary(report));
    }
    Ok(())
}

fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Succeeded { .. } => "succeeded".to_string(),
        RunOutcome::Failed {
            state, error_class, ..
        } => format!("failed at {} ({})", state, error_class),
    }
}

fn summary(report: &RunReport) -> String {
    let trail: Vec<String> = report
        .history
        .iter()
        .map(|h| match (h.outcome, h.error_class.as_deref()) {
            (StepOutcome::Failure, Some(class)) => format!("{} [{}]", h.state, class),
            _ => h.state.clone(),
        })
        .collect();

    let mut lines = vec![
        format!(
            "Pipeline {} run {} {} in {} ms",
            report.pipeline,
            report.execution_id,
            describe_outcome(&report.outcome),
            report.duration_ms()
        ),
        format!("  path: {}", trail.join(" -> ")),
    ];

    match &report.outcome {
        RunOutcome::Succeeded { payload } => lines.push(format!("  output: {}", payload)),
        RunOutcome::Failed {
            cause: Some(cause), ..
        } => lines.push(format!("  cause: {}", cause)),
        RunOutcome::Failed { .. } => {}
    }

    lines.join("\n")
}
