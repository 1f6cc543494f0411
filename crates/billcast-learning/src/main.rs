//! CLI entry point for the billing forecast pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use billcast_learning::{
    DEFAULT_MODEL_PATH, ForecastOutput, ForecastPipeline, Metrics, Predictor, TrainedModel,
    TrainerConfig,
};
use billcast_processing::io::{load_csv_with_fallbacks, write_csv};
use billcast_processing::{
    CleaningPipeline, CleaningSummary, MissingTargetPolicy, PipelineConfig, ProgressUpdate,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

/// CLI-compatible missing-target policy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTargetPolicy {
    /// Drop rows whose target is missing
    Drop,
    /// Fill missing targets with the column mean
    Mean,
}

impl From<CliTargetPolicy> for MissingTargetPolicy {
    fn from(cli: CliTargetPolicy) -> Self {
        match cli {
            CliTargetPolicy::Drop => MissingTargetPolicy::Drop,
            CliTargetPolicy::Mean => MissingTargetPolicy::MeanImpute,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Utility-billing cleaning and forecasting pipeline",
    long_about = "Cleans raw utility-billing exports and trains a random forest that \
                  predicts the bill amount.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  BILLCAST_MODEL_PATH   Default model artifact path\n  \
                  RUST_LOG              Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Clean, train and score\n  \
                  billcast run -i bills.csv -o outputs/\n\n  \
                  # Cleaning only\n  \
                  billcast clean -i bills.csv -o cleaned.csv\n\n  \
                  # Score a cleaned batch with a saved model\n  \
                  billcast predict -i cleaned.csv -o scored.csv"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a raw export, train a model and score the cleaned rows
    Run(RunArgs),
    /// Clean a raw export and write the cleaned CSV
    Clean(CleanArgs),
    /// Score a cleaned CSV with a saved model; the bill amount column is optional
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the raw CSV export
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for predictions and metrics
    #[arg(short, long, default_value = "./outputs")]
    output_dir: PathBuf,

    /// Where to write the trained model
    #[arg(long, env = "BILLCAST_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// What to do with rows whose target is missing
    #[arg(long, value_enum, default_value = "drop")]
    target_policy: CliTargetPolicy,

    /// Number of trees in the forest
    #[arg(long, default_value = "200")]
    trees: usize,

    /// Seed for the split and bootstrap samples
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Path to the raw CSV export
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the cleaned CSV
    #[arg(short, long)]
    output: PathBuf,

    /// What to do with rows whose target is missing
    #[arg(long, value_enum, default_value = "drop")]
    target_policy: CliTargetPolicy,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Path to a cleaned CSV, with or without the bill amount column
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the scored CSV
    #[arg(short, long)]
    output: PathBuf,

    /// Model artifact to load
    #[arg(long, env = "BILLCAST_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,
}

/// Contents of `metrics.json`.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    input_file: String,
    predictions_file: String,
    model_path: Option<String>,
    target_column: &'a str,
    features: &'a [String],
    n_trees: usize,
    metrics: &'a Metrics,
    cleaning: &'a CleaningSummary,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // .env first so `env = ...` arguments can see it
    dotenv().ok();

    let cli = Cli::parse();
    let json_output = matches!(&cli.command, Command::Run(args) if args.json);
    init_logging(&cli.log_level, cli.quiet, json_output);

    match &cli.command {
        Command::Run(args) => run(args, cli.quiet),
        Command::Clean(args) => clean(args),
        Command::Predict(args) => predict(args),
    }
}

fn load_input(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    info!("Loading dataset from: {}", path.display());
    let data = load_csv_with_fallbacks(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!("Dataset loaded successfully: {:?}", data.shape());
    Ok(data)
}

fn log_progress(update: ProgressUpdate) {
    info!(
        "[{:.0}%] {}: {}",
        update.progress * 100.0,
        update.stage.display_name(),
        update.message
    );
}

fn run(args: &RunArgs, quiet: bool) -> Result<()> {
    let data = load_input(&args.input)?;

    let cleaning_config = PipelineConfig::builder()
        .missing_target_policy(args.target_policy.into())
        .build()?;
    let trainer_config = TrainerConfig::builder()
        .n_trees(args.trees)
        .random_seed(args.seed)
        .model_path(&args.model_path)
        .build()?;

    let mut builder = ForecastPipeline::builder()
        .cleaning_config(cleaning_config)
        .trainer_config(trainer_config);
    if !quiet && !args.json {
        builder = builder.on_progress(log_progress);
    }

    let mut output = builder.build()?.run(data).context("Pipeline failed")?;

    std::fs::create_dir_all(&args.output_dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let predictions_path = args
        .output_dir
        .join(format!("water_bill_predictions_{}.csv", stamp));
    write_csv(&mut output.scored, &predictions_path)?;

    let report = RunReport {
        input_file: args.input.display().to_string(),
        predictions_file: predictions_path.display().to_string(),
        model_path: output.model_path.as_ref().map(|p| p.display().to_string()),
        target_column: &output.model.target_column,
        features: &output.model.feature_names,
        n_trees: output.model.forest.n_trees(),
        metrics: &output.metrics,
        cleaning: &output.summary,
    };
    let metrics_path = args.output_dir.join("metrics.json");
    std::fs::write(&metrics_path, serde_json::to_string_pretty(&report)?)?;
    info!("Metrics written to: {}", metrics_path.display());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_run_summary(&output, &report);
    Ok(())
}

fn clean(args: &CleanArgs) -> Result<()> {
    let data = load_input(&args.input)?;
    let config = PipelineConfig::builder()
        .missing_target_policy(args.target_policy.into())
        .build()?;

    let mut cleaned = CleaningPipeline::builder()
        .config(config)
        .on_progress(log_progress)
        .build()?
        .process(data)
        .context("Cleaning failed")?;

    write_csv(&mut cleaned.data, &args.output)?;

    let summary = &cleaned.summary;
    println!(
        "Cleaned {} -> {} ({} rows x {} columns, {} rows removed)",
        args.input.display(),
        args.output.display(),
        summary.rows_after,
        summary.columns_after,
        summary.rows_removed
    );
    for warning in &summary.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

fn predict(args: &PredictArgs) -> Result<()> {
    let model = TrainedModel::load(&args.model_path)?;
    let data = load_input(&args.input)?;

    // cleaned CSVs store the timestamp as text; only numeric columns matter here
    let schema = PipelineConfig::default().schema;
    let mut scored = Predictor::new(&model, &schema).predict(&data)?;
    write_csv(&mut scored, &args.output)?;

    println!(
        "Scored {} rows with {} ({} trees) -> {}",
        scored.height(),
        args.model_path.display(),
        model.forest.n_trees(),
        args.output.display()
    );
    Ok(())
}

/// Print a human-readable summary of a run.
fn print_run_summary(output: &ForecastOutput, report: &RunReport<'_>) {
    let summary = &output.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("FORECAST COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!("Input:       {}", report.input_file);
    println!("Predictions: {}", report.predictions_file);
    if let Some(path) = &report.model_path {
        println!("Model:       {}", path);
    }
    println!();
    println!("Cleaning:");
    println!(
        "  Rows: {} -> {} ({} removed)",
        summary.rows_before, summary.rows_after, summary.rows_removed
    );
    println!(
        "  Columns: {} -> {} ({} removed)",
        summary.columns_before, summary.columns_after, summary.columns_removed
    );
    for action in &summary.actions {
        println!("  - {}", action.description);
    }
    for warning in &summary.warnings {
        println!("  warning: {}", warning);
    }
    println!();
    println!("Model:");
    println!("  Target:   {}", report.target_column);
    println!("  Features: {}", report.features.join(", "));
    println!(
        "  Trees: {}, train rows: {}, held-out rows: {}",
        report.n_trees, output.metrics.train_rows, output.metrics.test_rows
    );
    println!("  R²:   {:.4}", output.metrics.r2);
    println!("  RMSE: {:.4}", output.metrics.rmse);
    println!("{}", "=".repeat(80));
}
