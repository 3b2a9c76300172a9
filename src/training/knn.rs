//! K-Nearest Neighbors classifier

use super::classifier::{check_fit_input, check_n_features, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// Euclidean KNN classifier. Stores the training matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNClassifier {
    fn default() -> Self {
        Self::with_k(5)
    }
}

impl KNNClassifier {
    pub fn with_k(k: usize) -> Self {
        Self {
            n_neighbors: k.max(1),
            weights: WeightScheme::Uniform,
            x_train: None,
            y_train: None,
        }
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    fn score_row(&self, x_train: &Array2<f64>, y_train: &Array1<f64>, row: ArrayView1<f64>) -> f64 {
        let mut neighbors: Vec<(f64, f64)> = x_train
            .rows()
            .into_iter()
            .zip(y_train.iter())
            .map(|(train_row, &label)| {
                let d = train_row
                    .iter()
                    .zip(row.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                (d, label)
            })
            .collect();

        // k is capped at the training size
        let k = self.n_neighbors.min(neighbors.len());
        neighbors.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let nearest = &neighbors[..k];

        match self.weights {
            WeightScheme::Uniform => {
                nearest.iter().filter(|(_, l)| *l > 0.5).count() as f64 / k as f64
            }
            WeightScheme::Distance => {
                // exact matches take all the weight
                let exact: Vec<&(f64, f64)> = nearest.iter().filter(|(d, _)| *d < 1e-12).collect();
                if !exact.is_empty() {
                    return exact.iter().filter(|(_, l)| *l > 0.5).count() as f64
                        / exact.len() as f64;
                }
                let total: f64 = nearest.iter().map(|(d, _)| 1.0 / d).sum();
                let positive: f64 = nearest
                    .iter()
                    .filter(|(_, l)| *l > 0.5)
                    .map(|(d, _)| 1.0 / d)
                    .sum();
                positive / total
            }
        }
    }
}

impl Classifier for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x_train), Some(y_train)) => (x_train, y_train),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        check_n_features(x_train.ncols(), x)?;

        let rows: Vec<ArrayView1<f64>> = x.rows().into_iter().collect();
        let scores: Vec<f64> = rows
            .par_iter()
            .map(|row| self.score_row(x_train, y_train, row.view()))
            .collect();
        Ok(Array1::from_vec(scores))
    }

    fn is_finite(&self) -> bool {
        let x_ok = self.x_train.as_ref().map_or(true, |x| x.iter().all(|v| v.is_finite()));
        let y_ok = self.y_train.as_ref().map_or(true, |y| y.iter().all(|v| v.is_finite()));
        x_ok && y_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_classifier() {
        let x = array![[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [5.0, 5.0], [5.1, 4.9], [4.8, 5.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();
        let pred = knn.predict(&array![[0.05, 0.05], [5.0, 5.1]]).unwrap();
        assert_eq!(pred.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_k_capped_at_training_size() {
        let mut knn = KNNClassifier::with_k(10);
        knn.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).unwrap();
        let p = knn.predict_proba(&array![[0.4]]).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weights_favor_closer() {
        let mut knn = KNNClassifier::with_k(2).with_weights(WeightScheme::Distance);
        knn.fit(&array![[0.0], [3.0]], &array![1.0, 0.0]).unwrap();
        let p = knn.predict_proba(&array![[1.0]]).unwrap();
        assert!((p[0] - 2.0 / 3.0).abs() < 1e-12);
    }
}
