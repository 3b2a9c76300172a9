//! Stratified k-fold cross-validation

use super::catalog::EstimatorSpec;
use super::classifier::Classifier;
use super::metrics::ClassificationScores;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Shuffled stratified k-fold splitter
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub random_state: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, random_state: u64) -> Self {
        Self {
            n_splits,
            random_state,
        }
    }

    /// Folds actually used for `n_samples` rows: capped at the sample count
    pub fn effective_splits(&self, n_samples: usize) -> usize {
        self.n_splits.min(n_samples).max(2)
    }

    /// Generate train/test splits that keep the class ratio in every fold.
    ///
    /// Rows are dealt to folds round-robin, class by class, with a single
    /// counter so that every fold receives at least one test row.
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        if n_samples < 2 {
            return Err(PipelineError::TrainingError(format!(
                "cross-validation needs at least 2 training rows, got {}",
                n_samples
            )));
        }
        let n_splits = self.effective_splits(n_samples);

        let mut by_class: BTreeMap<bool, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label > 0.5).or_default().push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut fold_of = vec![0usize; n_samples];
        let mut counter = 0usize;
        for indices in by_class.values_mut() {
            indices.shuffle(&mut rng);
            for &i in indices.iter() {
                fold_of[i] = counter % n_splits;
                counter += 1;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| fold_of[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();
        Ok(splits)
    }
}

/// Per-fold scores and their mean
#[derive(Debug, Clone)]
pub struct CVResult {
    pub fold_scores: Vec<ClassificationScores>,
    pub mean: ClassificationScores,
}

/// Fit and score `spec` on every split. Folds run in parallel.
pub fn cross_validate(
    spec: &EstimatorSpec,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
    seed: u64,
) -> Result<CVResult> {
    let fold_scores: Vec<ClassificationScores> = splits
        .par_iter()
        .map(|split| {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut model = spec.build(seed)?;
            model.fit(&x_train, &y_train)?;
            if !model.is_finite() {
                return Err(PipelineError::TrainingError(format!(
                    "{} fitted non-finite parameters on fold {}",
                    spec.kind.id(),
                    split.fold_idx
                )));
            }
            let proba = model.predict_proba(&x_test)?;
            let pred = proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 });
            Ok(ClassificationScores::compute(&y_test, &pred, &proba))
        })
        .collect::<Result<_>>()?;

    let mean = ClassificationScores::mean(&fold_scores);
    debug!(
        model = spec.kind.id(),
        folds = fold_scores.len(),
        accuracy = mean.accuracy,
        "cross-validation finished"
    );
    Ok(CVResult { fold_scores, mean })
}
