//! Churn Pipeline - Main Entry Point
//!
//! `churn-pipeline [--config PATH] <prepare|train|evaluate|run>`

use clap::Parser;
use churn_pipeline::cli::{execute, init_logging, Cli};

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    execute(&cli)
}
