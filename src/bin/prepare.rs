//! Data preparation stage, no arguments

use churn_pipeline::cli::{cmd_prepare, init_logging};

fn main() -> anyhow::Result<()> {
    init_logging();
    cmd_prepare()?;
    Ok(())
}
