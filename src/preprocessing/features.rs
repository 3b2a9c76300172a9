//! Feature pipeline: imputation, one-hot encoding and standard scaling

use crate::data::{Column, Table};
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fitted transformation of a single input column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureTransform {
    /// Mean imputation followed by standard scaling
    Numeric { name: String, mean: f64, std: f64 },
    /// Mode imputation followed by one-hot encoding over the training categories
    OneHot {
        name: String,
        categories: Vec<String>,
        mode: Option<String>,
    },
}

impl FeatureTransform {
    fn width(&self) -> usize {
        match self {
            FeatureTransform::Numeric { .. } => 1,
            FeatureTransform::OneHot { categories, .. } => categories.len(),
        }
    }

    fn column_name(&self) -> &str {
        match self {
            FeatureTransform::Numeric { name, .. } | FeatureTransform::OneHot { name, .. } => name,
        }
    }
}

/// Column-wise preprocessing fitted on the training partition and stored
/// inside the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    transforms: Vec<FeatureTransform>,
    output_names: Vec<String>,
}

impl FeaturePipeline {
    /// Fit on a feature table (label column already removed)
    pub fn fit(features: &Table) -> Result<Self> {
        if features.n_rows() == 0 {
            return Err(PipelineError::PreprocessingError(
                "cannot fit the feature pipeline on zero rows".to_string(),
            ));
        }

        let transforms: Vec<FeatureTransform> = features.columns().iter().map(fit_column).collect();

        let output_names = transforms
            .iter()
            .flat_map(|t| match t {
                FeatureTransform::Numeric { name, .. } => vec![name.clone()],
                FeatureTransform::OneHot { name, categories, .. } => categories
                    .iter()
                    .map(|c| format!("{}_{}", name, c))
                    .collect(),
            })
            .collect();

        Ok(Self {
            transforms,
            output_names,
        })
    }

    /// Build the design matrix. Columns are looked up by name, so extra
    /// columns in `table` (such as the label) are ignored.
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        let n_rows = table.n_rows();
        let mut x = Array2::zeros((n_rows, self.n_outputs()));

        let mut offset = 0;
        for transform in &self.transforms {
            let column = table.column(transform.column_name())?;
            match transform {
                FeatureTransform::Numeric { mean, std, .. } => {
                    for row in 0..n_rows {
                        let value = column.number(row).unwrap_or(*mean);
                        x[[row, offset]] = (value - mean) / std;
                    }
                }
                FeatureTransform::OneHot { categories, mode, .. } => {
                    for row in 0..n_rows {
                        let value = column.text(row).or_else(|| mode.clone());
                        if let Some(pos) = value
                            .as_ref()
                            .and_then(|v| categories.iter().position(|c| c == v))
                        {
                            x[[row, offset + pos]] = 1.0;
                        }
                    }
                }
            }
            offset += transform.width();
        }

        Ok(x)
    }

    /// Whether every fitted statistic is a finite number
    pub fn is_finite(&self) -> bool {
        self.transforms.iter().all(|t| match t {
            FeatureTransform::Numeric { mean, std, .. } => mean.is_finite() && std.is_finite(),
            FeatureTransform::OneHot { .. } => true,
        })
    }

    /// Width of the design matrix
    pub fn n_outputs(&self) -> usize {
        self.transforms.iter().map(FeatureTransform::width).sum()
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn input_columns(&self) -> Vec<&str> {
        self.transforms.iter().map(FeatureTransform::column_name).collect()
    }
}

fn fit_column(column: &Column) -> FeatureTransform {
    if column.is_numeric() {
        let values: Vec<f64> = (0..column.len()).filter_map(|r| column.number(r)).collect();
        let (mean, std) = if values.is_empty() {
            (0.0, 1.0)
        } else {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            (mean, if std > 1e-12 { std } else { 1.0 })
        };
        return FeatureTransform::Numeric {
            name: column.name.clone(),
            mean,
            std,
        };
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in 0..column.len() {
        if let Some(v) = column.text(row) {
            *counts.entry(v).or_insert(0) += 1;
        }
    }

    // BTreeMap iterates in key order, so ties resolve to the smallest category
    let mode = counts
        .iter()
        .fold(None::<(&String, usize)>, |best, (k, &c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((k, c)),
        })
        .map(|(k, _)| k.clone());

    FeatureTransform::OneHot {
        name: column.name.clone(),
        categories: counts.into_keys().collect(),
        mode,
    }
}
