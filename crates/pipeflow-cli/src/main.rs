//! Pipeflow command line.
//!
//! Runs, validates, prints and replays pipeline definitions.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use pipeflow_core::PipelineError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pipeflow")]
#[command(version, about = "Pipeflow - declarative pipeline orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline once
    ///
    /// Examples:
    ///     pipeflow run --payload '{"bucket": "in", "key": "a.csv"}'
    ///     pipeflow run -d pipelines/etl.yaml --input payload.json --json
    ///     pipeflow run --payload '{"key": "a.csv"}' --report run.json
    #[command(verbatim_doc_comment)]
    Run {
        /// Definition file (YAML or JSON); the built-in CSV ETL pipeline when omitted
        #[arg(short, long)]
        definition: Option<PathBuf>,

        /// Input payload as inline JSON
        #[arg(short, long, conflicts_with = "input")]
        payload: Option<String>,

        /// Input payload read from a JSON file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Default per-state timeout in seconds
        #[arg(long, env = "PIPEFLOW_STEP_TIMEOUT_SECS")]
        step_timeout: Option<u64>,

        /// Deadline for the whole run in seconds
        #[arg(long, env = "PIPEFLOW_RUN_TIMEOUT_SECS")]
        run_timeout: Option<u64>,

        /// Write the full run report (with history) to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a definition file without running it
    Validate {
        /// Definition file (YAML or JSON)
        file: PathBuf,
    },

    /// Print a definition in canonical YAML form
    Show {
        /// Definition file; the built-in CSV ETL pipeline when omitted
        file: Option<PathBuf>,
    },

    /// Re-execute a recorded run from its report and check the outcome
    Replay {
        /// Run report written by `pipeflow run --report`
        #[arg(long)]
        history: PathBuf,

        /// Definition file; the built-in CSV ETL pipeline when omitted
        #[arg(short, long)]
        definition: Option<PathBuf>,

        /// Print the replayed report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,pipeflow=debug,pipeflow_core=debug,pipeflow_tasks=debug".into());

    let (json, text) = match format {
        LogFormat::Json => (Some(fmt::layer().json().with_writer(std::io::stderr)), None),
        LogFormat::Text => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

/// Exit code for an error that stopped a command.
fn error_exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<PipelineError>() {
        Some(e) if e.is_definition_error() => ExitCode::from(commands::EXIT_DEFINITION_ERROR),
        _ => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = match cli.command {
        Commands::Run {
            definition,
            payload,
            input,
            step_timeout,
            run_timeout,
            report,
            json,
        } => {
            commands::run(commands::RunArgs {
                definition,
                payload,
                input,
                step_timeout,
                run_timeout,
                report,
                json,
            })
            .await
        }
        Commands::Validate { file } => commands::validate(&file),
        Commands::Show { file } => commands::show(file.as_deref()),
        Commands::Replay {
            history,
            definition,
            json,
        } => commands::replay(&history, definition.as_deref(), json).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            eprintln!("Error: {e:#}");
            error_exit_code(&e)
        }
    }
}
