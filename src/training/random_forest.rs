//! Random forest and extra trees ensembles

use super::classifier::{check_fit_input, check_n_features, Classifier};
use super::decision_tree::{Criterion, DecisionTree, Splitter};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Bagged ensemble of decision trees.
///
/// With `extra` set the trees draw one random threshold per feature and
/// bootstrapping is off by default, which gives an extra trees classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub criterion: Criterion,
    /// Randomized thresholds
    pub extra: bool,
    pub random_state: u64,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new random forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            extra: false,
            random_state: 42,
            n_features: 0,
        }
    }

    /// Create an extra trees ensemble
    pub fn extra_trees(n_estimators: usize) -> Self {
        Self {
            bootstrap: false,
            extra: true,
            ..Self::new(n_estimators)
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let max_features = self.max_features.resolve(n_features);
        let splitter = if self.extra { Splitter::Random } else { Splitter::Best };

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = self.random_state.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let rows: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features))
                    .with_criterion(self.criterion)
                    .with_splitter(splitter)
                    .with_random_state(seed);
                tree.fit_rows(x, y, &rows)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<_>>()?;

        let mut sum = Array1::zeros(x.nrows());
        for p in &per_tree {
            sum += p;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn is_finite(&self) -> bool {
        self.trees.iter().all(|t| t.is_finite())
    }
}
