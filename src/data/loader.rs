//! CSV loading and writing

use super::table::Table;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Rows scanned for dtype inference
const INFER_SCHEMA_ROWS: usize = 1000;

/// Read a CSV file with a header row into a polars frame
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(PipelineError::DataError(format!(
            "input file not found: {}",
            path.display()
        )));
    }

    let start = Instant::now();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    debug!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded CSV"
    );
    Ok(df)
}

/// Write a frame as CSV with a header row, creating parent directories
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Read a CSV file straight into a [`Table`]
pub fn load_table(path: &Path) -> Result<Table> {
    let df = read_csv(path)?;
    Table::from_dataframe(&df)
}

/// SHA-256 of the file bytes, hex encoded
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
