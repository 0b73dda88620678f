//! `semflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: statically check a graph JSON file.
//! - `run`: validate and execute a graph, printing its terminal outputs.
//!
//! Both run against the built-in `basic` and `math` vessels.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use semflow_engine::{
    EngineError, ExecutorConfig, Graph, GraphExecutor, ValidationError, ValidationMode, VesselRegistry,
};

#[derive(Parser)]
#[command(name = "semflow", about = "Validate and run semantic dataflow graphs", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a graph definition without running it.
    Validate {
        /// Path to the graph JSON file.
        path: PathBuf,
        #[command(flatten)]
        options: Options,
    },
    /// Execute a graph and print its terminal outputs as JSON.
    Run {
        /// Path to the graph JSON file.
        path: PathBuf,
        /// Run without validating first.
        #[arg(long)]
        skip_validation: bool,
        #[command(flatten)]
        options: Options,
    },
}

#[derive(Args)]
struct Options {
    /// Executor configuration JSON; flags override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Stop at the first validation error.
    #[arg(long)]
    fail_fast: bool,
    /// Follow chains of declared type conversions.
    #[arg(long)]
    transitive: bool,
}

impl Options {
    fn executor_config(&self) -> anyhow::Result<ExecutorConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&read(path)?)
                .with_context(|| format!("invalid executor config in {}", path.display()))?,
            None => ExecutorConfig::default(),
        };
        if self.fail_fast {
            config.validator.mode = ValidationMode::FailFast;
        }
        if self.transitive {
            config.validator.transitive_conversions = true;
        }
        debug!("executor config: {:?}", config);
        Ok(config)
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    serde_json::from_str(&read(path)?).with_context(|| format!("invalid graph JSON in {}", path.display()))
}

fn report_violations(errors: &[ValidationError]) {
    eprintln!("graph rejected with {} error(s):", errors.len());
    for err in errors {
        eprintln!("  [{}] {}", err.code(), err);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path, options } => {
            let graph = load_graph(&path)?;
            let executor = GraphExecutor::new(Arc::new(VesselRegistry::with_builtins()), options.executor_config()?);

            match executor.validate_graph(&graph) {
                Ok(()) => {
                    println!(
                        "graph is valid: {} node(s), {} connection(s)",
                        graph.nodes.len(),
                        graph.connections.len()
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(errors) => {
                    report_violations(&errors);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Run { path, skip_validation, options } => {
            let graph = load_graph(&path)?;
            let mut config = options.executor_config()?;
            if skip_validation {
                config.validate_before_run = false;
            }
            let executor = GraphExecutor::new(Arc::new(VesselRegistry::with_builtins()), config);

            match executor.execute_graph(&graph).await {
                Ok(outcome) => {
                    info!(
                        "run {} executed {} node(s), skipped {}",
                        outcome.run_id,
                        outcome.executed.len(),
                        outcome.skipped.len()
                    );
                    let rendered =
                        serde_json::to_string_pretty(&outcome).context("cannot serialise run outcome")?;
                    println!("{rendered}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(EngineError::Validation(errors)) => {
                    report_violations(&errors);
                    Ok(ExitCode::FAILURE)
                }
                Err(err) => {
                    eprintln!("run failed: {err}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
