use std::{path::{Path, PathBuf}, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sqlmerge::{BatchEntry, ConsolidationEngine, EngineConfig, ExecutionPlan, ExecutionReport, MemoryBackend, RawQuery, ResultAggregator};

/// Consolidates batches of SELECT statements into fewer scans.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Write the JSON document here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a batch and print its execution plan
    Plan {
        /// JSON array of statements or `{ "id", "sql" }` objects
        #[arg(short, long)]
        batch: PathBuf,
    },
    /// Execute a plan against a JSON dataset and print the group results
    Execute {
        #[arg(short, long)]
        plan: PathBuf,
        /// JSON object mapping table names to arrays of rows
        #[arg(short, long)]
        dataset: PathBuf,
    },
    /// Merge a plan and its group results into a per-query report
    Report {
        #[arg(short, long)]
        plan: PathBuf,
        #[arg(short, long)]
        results: PathBuf,
    },
    /// Plan, execute and report in one go
    Run {
        #[arg(short, long)]
        batch: PathBuf,
        #[arg(short, long)]
        dataset: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = load_config(cli.config.as_deref())?;

    let document = match &cli.command {
        Command::Plan { batch } => {
            let batch = read_batch(batch).await?;
            let plan = ConsolidationEngine::<MemoryBackend>::plan_with(&config, &batch).context("Failed to plan batch")?;
            plan.to_json().context("Failed to serialize plan")?
        }
        Command::Execute { plan, dataset } => {
            let plan = read_plan(plan).await?;
            let engine = ConsolidationEngine::new(config, Arc::new(load_dataset(dataset).await?));
            cancel_on_ctrl_c(engine.cancellation_token());
            let execution = engine.execute(&plan).await;
            execution.to_json().context("Failed to serialize execution report")?
        }
        Command::Report { plan, results } => {
            let plan = read_plan(plan).await?;
            let text = read_text(results).await?;
            let execution = ExecutionReport::from_json(&text).with_context(|| format!("Failed to decode results {}", results.display()))?;
            if execution.plan_id != plan.plan_id {
                warn!(plan_id = %plan.plan_id, results_plan_id = %execution.plan_id, "results belong to a different plan");
            }
            let report = ResultAggregator::new(&config.checks).aggregate(&plan, &execution);
            report.to_json().context("Failed to serialize report")?
        }
        Command::Run { batch, dataset } => {
            let batch = read_batch(batch).await?;
            let engine = ConsolidationEngine::new(config, Arc::new(load_dataset(dataset).await?));
            cancel_on_ctrl_c(engine.cancellation_token());
            let (_, report) = engine.run(&batch).await.context("Failed to run batch")?;
            report.to_json().context("Failed to serialize report")?
        }
    };

    write_output(cli.output.as_deref(), &document).await
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn read_batch(path: &Path) -> Result<Vec<RawQuery>> {
    let text = read_text(path).await?;
    let batch = BatchEntry::from_json(&text).with_context(|| format!("Failed to decode batch {}", path.display()))?;
    info!(path = %path.display(), queries = batch.len(), "batch loaded");
    Ok(batch)
}

async fn read_plan(path: &Path) -> Result<ExecutionPlan> {
    let text = read_text(path).await?;
    ExecutionPlan::from_json(&text).with_context(|| format!("Failed to decode plan {}", path.display()))
}

async fn load_dataset(path: &Path) -> Result<MemoryBackend> {
    MemoryBackend::load_from_file(path)
        .await
        .with_context(|| format!("Failed to load dataset {}", path.display()))
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling pending groups");
            token.cancel();
        }
    });
}

async fn write_output(path: Option<&Path>, document: &str) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, document)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{document}");
            Ok(())
        }
    }
}
