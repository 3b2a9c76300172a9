//! Data preparation stage

use crate::data::{read_csv, write_csv};
use crate::error::Result;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use tracing::info;

/// What the preparer wrote
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareReport {
    pub rows: usize,
    pub columns: usize,
    pub output: PathBuf,
}

/// Cleaning hook applied between reading and writing. Identity for now.
pub fn clean(df: DataFrame) -> Result<DataFrame> {
    Ok(df)
}

/// Read `raw`, clean it and write it to `processed`
pub fn run(raw: &Path, processed: &Path) -> Result<PrepareReport> {
    let df = read_csv(raw)?;
    let mut cleaned = clean(df)?;
    write_csv(&mut cleaned, processed)?;

    let report = PrepareReport {
        rows: cleaned.height(),
        columns: cleaned.width(),
        output: processed.to_path_buf(),
    };
    info!(
        input = %raw.display(),
        output = %processed.display(),
        rows = report.rows,
        columns = report.columns,
        "processed dataset written"
    );
    Ok(report)
}
