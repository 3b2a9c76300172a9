//! Evaluation stage, reads `params.yaml` from the working directory

use churn_pipeline::cli::{cmd_evaluate, init_logging};
use churn_pipeline::config::DEFAULT_CONFIG_PATH;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    init_logging();
    cmd_evaluate(Path::new(DEFAULT_CONFIG_PATH))?;
    Ok(())
}
