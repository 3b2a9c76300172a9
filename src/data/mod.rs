//! Data module
//!
//! CSV IO through polars, the in-memory [`Table`] every stage works on, and
//! the shared deterministic holdout split.

mod table;
mod loader;
mod split;

pub use table::{Column, ColumnData, Table};
pub use loader::{file_digest, load_table, read_csv, write_csv};
pub use split::HoldoutSplit;
