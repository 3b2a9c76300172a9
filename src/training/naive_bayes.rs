//! Gaussian Naive Bayes for continuous features

use super::classifier::{check_fit_input, check_n_features, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Per-class Gaussian statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassStats {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Portion of the largest feature variance added to every variance
    pub var_smoothing: f64,
    /// Index 0 holds the negative class, 1 the positive class
    stats: [Option<ClassStats>; 2],
    n_features: usize,
    fitted: bool,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            var_smoothing: 1e-9,
            stats: [None, None],
            n_features: 0,
            fitted: false,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Single-pass Welford mean and variance over the selected rows
    fn welford(x: &Array2<f64>, rows: &[usize]) -> (Vec<f64>, Vec<f64>) {
        let n_features = x.ncols();
        let mut means = vec![0.0; n_features];
        let mut m2 = vec![0.0; n_features];
        for (count, &idx) in rows.iter().enumerate() {
            let count = (count + 1) as f64;
            for (j, &val) in x.row(idx).iter().enumerate() {
                let delta = val - means[j];
                means[j] += delta / count;
                m2[j] += delta * (val - means[j]);
            }
        }
        let n = rows.len().max(1) as f64;
        (means, m2.into_iter().map(|v| v / n).collect())
    }

    fn joint_log_likelihood(stats: &ClassStats, row: ArrayView1<f64>) -> f64 {
        let ll: f64 = row
            .iter()
            .zip(stats.means.iter())
            .zip(stats.variances.iter())
            .map(|((&xi, &mean), &var)| {
                -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
            })
            .sum();
        stats.log_prior + ll
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();

        let all_rows: Vec<usize> = (0..n_samples).collect();
        let (_, overall_var) = Self::welford(x, &all_rows);
        let max_var = overall_var.iter().cloned().fold(0.0, f64::max);
        let epsilon = (self.var_smoothing * max_var).max(1e-9);

        for (slot, positive) in [false, true].into_iter().enumerate() {
            let rows: Vec<usize> = (0..n_samples).filter(|&i| (y[i] > 0.5) == positive).collect();
            self.stats[slot] = if rows.is_empty() {
                None
            } else {
                let (means, variances) = Self::welford(x, &rows);
                Some(ClassStats {
                    log_prior: (rows.len() as f64 / n_samples as f64).ln(),
                    means,
                    variances: variances.into_iter().map(|v| v + epsilon).collect(),
                })
            };
        }

        self.n_features = x.ncols();
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let probs = x.rows().into_iter().map(|row| match (&self.stats[0], &self.stats[1]) {
            (Some(neg), Some(pos)) => {
                let a = Self::joint_log_likelihood(neg, row);
                let b = Self::joint_log_likelihood(pos, row);
                // log-sum-exp normalization
                let max_val = a.max(b);
                let log_sum = ((a - max_val).exp() + (b - max_val).exp()).ln();
                (b - max_val - log_sum).exp()
            }
            (None, Some(_)) => 1.0,
            _ => 0.0,
        });
        Ok(probs.collect())
    }

    fn is_finite(&self) -> bool {
        self.stats.iter().flatten().all(|s| {
            s.log_prior.is_finite()
                && s.means.iter().all(|v| v.is_finite())
                && s.variances.iter().all(|v| v.is_finite())
        })
    }
}
