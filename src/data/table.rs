//! In-memory tabular data

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Cell storage of a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Numeric column, missing cells are `None`
    Numeric(Vec<Option<f64>>),
    /// String-valued column, missing cells are `None`
    Categorical(Vec<Option<String>>),
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Categorical(values),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    /// Cell rendered as text, `None` when missing
    pub fn text(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Numeric(v) => v[row].map(format_number),
            ColumnData::Categorical(v) => v[row].clone(),
        }
    }

    /// Cell read as a number, `None` when missing or not parseable
    pub fn number(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Numeric(v) => v[row],
            ColumnData::Categorical(v) => v[row].as_deref().and_then(|s| s.trim().parse().ok()),
        }
    }

    /// Rows at `indices`, in the given order
    pub fn take(&self, indices: &[usize]) -> Self {
        let data = match &self.data {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        };
        Self {
            name: self.name.clone(),
            data,
        }
    }
}

/// Integral values print without a fractional part so `1.0` and `1` agree
pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Ordered collection of equally long columns. Row order is file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table, checking that every column has the same length
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(PipelineError::ShapeError {
                expected: format!("{} rows", n_rows),
                actual: format!("{} rows in column '{}'", bad.len(), bad.name),
            });
        }
        Ok(Self { columns, n_rows })
    }

    /// Convert a polars frame. Numeric dtypes stay numeric, everything else
    /// is read as text.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns = df
            .get_columns()
            .iter()
            .map(|column| {
                let series = column.as_materialized_series();
                let name = series.name().to_string();
                if is_numeric_dtype(series.dtype()) {
                    let values: Vec<Option<f64>> =
                        series.cast(&DataType::Float64)?.f64()?.into_iter().collect();
                    Ok(Column::numeric(name, values))
                } else {
                    let values: Vec<Option<String>> = series
                        .cast(&DataType::String)?
                        .str()?
                        .into_iter()
                        .map(|v| v.map(str::to_string))
                        .collect();
                    Ok(Column::categorical(name, values))
                }
            })
            .collect::<Result<Vec<Column>>>()?;

        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| PipelineError::FeatureNotFound(name.to_string()))
    }

    /// Rows at `indices`, in the given order
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            n_rows: indices.len(),
        }
    }

    /// A copy without the named columns. Unknown names are ignored.
    pub fn without(&self, names: &[&str]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name.as_str()))
                .cloned()
                .collect(),
            n_rows: self.n_rows,
        }
    }

    /// Separate the label column from the features
    pub fn split_target(&self, target: &str) -> Result<(Table, Column)> {
        let label = self.column(target)?.clone();
        Ok((self.without(&[target]), label))
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
