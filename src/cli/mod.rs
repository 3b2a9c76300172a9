//! Churn Pipeline CLI Module
//!
//! Entry points shared by the umbrella `churn-pipeline` binary and the three
//! single-stage binaries.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{PipelineParams, DEFAULT_CONFIG_PATH, PROCESSED_DATA_PATH, RAW_DATA_PATH};
use crate::stages::{self, evaluate::EvaluationReport, prepare::PrepareReport, train::TrainReport};
use crate::tracking::{TrackingClient, TrackingDestination};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn score(key: &str, value: f64) {
    println!("  {:<18} {}", muted(key), format!("{:.4}", value).white().bold());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "churn-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Telco churn prediction pipeline: prepare, train, evaluate")]
#[command(long_about = None)]
pub struct Cli {
    /// Pipeline configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy the raw dataset to the processed location
    Prepare,
    /// Compare, tune and finalize models, logging every run
    Train,
    /// Score the best run on the holdout set and append final metrics
    Evaluate,
    /// Prepare, train and evaluate in order
    Run,
}

/// Install the tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_pipeline=info".into()),
        )
        .init();
}

/// Dispatch a parsed command line
pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Prepare => cmd_prepare().map(|_| ()),
        Commands::Train => cmd_train(&cli.config).map(|_| ()),
        Commands::Evaluate => cmd_evaluate(&cli.config).map(|_| ()),
        Commands::Run => cmd_run(&cli.config),
    }
}

fn connect(params: &PipelineParams) -> anyhow::Result<TrackingClient> {
    let destination = TrackingDestination::from_params(params)?;
    Ok(TrackingClient::new(&destination)?)
}

pub fn cmd_prepare() -> anyhow::Result<PrepareReport> {
    section("Prepare");

    step_run("Writing processed dataset");
    let start = Instant::now();
    let report = stages::prepare::run(Path::new(RAW_DATA_PATH), Path::new(PROCESSED_DATA_PATH))?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        report.rows,
        report.columns,
        start.elapsed()
    ));
    kv("Output", &report.output.display().to_string());
    println!();
    Ok(report)
}

pub fn cmd_train(config: &Path) -> anyhow::Result<TrainReport> {
    section("Train");

    let params = PipelineParams::load(config)?;
    let client = connect(&params)?;
    kv("Tracking", &client.endpoint());
    kv("Data", &params.data_read_csv.display().to_string());
    kv("Models", &params.models_to_compare.join(", "));

    step_run("Comparing, tuning and finalizing");
    let start = Instant::now();
    let report = stages::train::run(&params, &client)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    for (rank, (model, value)) in report.leaderboard.iter().enumerate() {
        println!(
            "  {} {:<10} {} {}",
            dim(&format!("{}.", rank + 1)),
            model.cyan(),
            muted(report.metric.name()),
            format!("{:.4}", value).white()
        );
    }
    println!();
    kv("Final model", &report.final_model);
    if let Some(run_id) = &report.final_run_id {
        kv("Final run", run_id);
    }
    score(&format!("CV {}", report.metric), report.final_scores.get(report.metric));
    println!();
    Ok(report)
}

pub fn cmd_evaluate(config: &Path) -> anyhow::Result<EvaluationReport> {
    section("Evaluate");

    let params = PipelineParams::load(config)?;
    let client = connect(&params)?;
    let report = stages::evaluate::run(&params, &client)?;

    kv("Best run", &report.run_id);
    kv("Run name", &report.run_name);
    match report.selection_value {
        Some(v) => score(&report.selection_metric, v),
        None => kv(&report.selection_metric, "-"),
    }
    kv("Holdout rows", &report.holdout_rows.to_string());

    section("Final metrics on holdout set");
    score("Accuracy", report.metrics.accuracy);
    score("Precision", report.metrics.precision);
    score("Recall", report.metrics.recall);
    score("F1-Score", report.metrics.f1);
    println!();
    println!("  {} final metrics logged to the selected run", ok("✓"));
    println!();
    Ok(report)
}

pub fn cmd_run(config: &Path) -> anyhow::Result<()> {
    cmd_prepare()?;
    cmd_train(config)?;
    cmd_evaluate(config)?;
    Ok(())
}
