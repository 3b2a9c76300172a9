//! Deterministic train/holdout split
//!
//! The trainer and the evaluator both call [`HoldoutSplit::new`] with the
//! same `(n_rows, train_size, seed)`; this is the only place the holdout
//! partition is computed. The trainer additionally records
//! [`HoldoutSplit::digest`] on its runs so the evaluator can detect a
//! diverging configuration or dataset.

use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Train/holdout partition of row indices
#[derive(Debug, Clone, PartialEq)]
pub struct HoldoutSplit {
    /// Training rows, ascending
    pub train_indices: Vec<usize>,
    /// Holdout rows, ascending
    pub holdout_indices: Vec<usize>,
    pub n_rows: usize,
    pub train_size: f64,
    pub seed: u64,
}

impl HoldoutSplit {
    /// Partition `n_rows` rows, keeping `train_size` of them for training.
    ///
    /// The holdout takes `round(n_rows * (1 - train_size))` rows, clamped so
    /// that both sides keep at least one row.
    pub fn new(n_rows: usize, train_size: f64, seed: u64) -> Result<Self> {
        if !(train_size > 0.0 && train_size < 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "train_size".to_string(),
                value: train_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if n_rows < 2 {
            return Err(PipelineError::DataError(format!(
                "need at least 2 rows for a train/holdout split, got {}",
                n_rows
            )));
        }

        let holdout_len = Self::holdout_len(n_rows, train_size);

        let mut indices: Vec<usize> = (0..n_rows).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let mut holdout_indices = indices[..holdout_len].to_vec();
        let mut train_indices = indices[holdout_len..].to_vec();
        holdout_indices.sort_unstable();
        train_indices.sort_unstable();

        Ok(Self {
            train_indices,
            holdout_indices,
            n_rows,
            train_size,
            seed,
        })
    }

    /// Number of holdout rows for a given dataset size
    pub fn holdout_len(n_rows: usize, train_size: f64) -> usize {
        let raw = (n_rows as f64 * (1.0 - train_size)).round() as usize;
        raw.clamp(1, n_rows.saturating_sub(1).max(1))
    }

    pub fn is_holdout(&self, row: usize) -> bool {
        self.holdout_indices.binary_search(&row).is_ok()
    }

    /// Fingerprint of the holdout partition, hex encoded SHA-256
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("n_rows={};", self.n_rows).as_bytes());
        for idx in &self.holdout_indices {
            hasher.update(idx.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_is_partition() {
        let split = HoldoutSplit::new(100, 0.7, 7).unwrap();
        assert_eq!(split.holdout_indices.len(), 30);
        assert_eq!(split.train_indices.len(), 70);

        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.holdout_indices.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = HoldoutSplit::new(50, 0.8, 42).unwrap();
        let b = HoldoutSplit::new(50, 0.8, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());

        let c = HoldoutSplit::new(50, 0.8, 43).unwrap();
        assert_ne!(a.holdout_indices, c.holdout_indices);
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_tiny_dataset_keeps_both_sides() {
        let split = HoldoutSplit::new(3, 0.67, 42).unwrap();
        assert_eq!(split.holdout_indices.len(), 1);
        assert_eq!(split.train_indices.len(), 2);

        let split = HoldoutSplit::new(2, 0.99, 1).unwrap();
        assert_eq!(split.holdout_indices.len(), 1);
        assert_eq!(split.train_indices.len(), 1);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(HoldoutSplit::new(1, 0.5, 0).is_err());
        assert!(HoldoutSplit::new(10, 0.0, 0).is_err());
        assert!(HoldoutSplit::new(10, 1.5, 0).is_err());
    }
}
