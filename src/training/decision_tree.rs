//! Decision tree classifier

use super::classifier::{check_fit_input, check_n_features, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node. Leaves hold the positive-class probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            TreeNode::Leaf { value, .. } => value.is_finite(),
            TreeNode::Split {
                threshold,
                left,
                right,
                ..
            } => threshold.is_finite() && left.is_finite() && right.is_finite(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(&self, n_pos: usize, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let p = n_pos as f64 / n as f64;
        match self {
            Criterion::Gini => 1.0 - p * p - (1.0 - p) * (1.0 - p),
            Criterion::Entropy => {
                let h = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                h(p) + h(1.0 - p)
            }
        }
    }
}

/// How split thresholds are chosen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Splitter {
    /// Scan every midpoint between distinct values
    Best,
    /// One uniform threshold per feature (extremely randomized trees)
    Random,
}

/// Binary classification tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split, all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub splitter: Splitter,
    pub random_state: u64,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            random_state: 0,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Fit on a subset of rows (used by bootstrapped ensembles)
    pub fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        if rows.is_empty() {
            return Err(PipelineError::TrainingError("empty row sample".to_string()));
        }
        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        self.root = Some(self.build(x, y, rows, 0, &mut rng));
        Ok(())
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = rows.len();
        let n_pos = rows.iter().filter(|&&r| y[r] > 0.5).count();
        let leaf = TreeNode::Leaf {
            value: n_pos as f64 / n as f64,
            n_samples: n,
        };

        let stop = n < self.min_samples_split
            || n < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || n_pos == 0
            || n_pos == n;
        if stop {
            return leaf;
        }

        let Some((feature_idx, threshold)) = self.find_split(x, y, rows, n_pos, rng) else {
            return leaf;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&r| x[[r, feature_idx]] <= threshold);

        let left = Box::new(self.build(x, y, &left_rows, depth + 1, rng));
        let right = Box::new(self.build(x, y, &right_rows, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples: n,
        }
    }

    fn find_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        n_pos: usize,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64)> {
        let n = rows.len();
        let parent = self.criterion.impurity(n_pos, n);

        let mut features: Vec<usize> = (0..x.ncols()).collect();
        if let Some(k) = self.max_features.filter(|&k| k < features.len()) {
            features.shuffle(rng);
            features.truncate(k.max(1));
            features.sort_unstable();
        }

        let mut best: Option<(usize, f64, f64)> = None;
        for feature_idx in features {
            let mut values: Vec<(f64, bool)> =
                rows.iter().map(|&r| (x[[r, feature_idx]], y[r] > 0.5)).collect();
            values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let (lo, hi) = (values[0].0, values[n - 1].0);
            if hi <= lo {
                continue;
            }

            let candidates: Vec<f64> = match self.splitter {
                Splitter::Best => values
                    .windows(2)
                    .filter(|w| w[1].0 > w[0].0)
                    .map(|w| (w[0].0 + w[1].0) / 2.0)
                    .collect(),
                Splitter::Random => vec![rng.gen_range(lo..hi)],
            };

            // sweep thresholds in ascending order over the sorted values
            let mut cursor = 0;
            let mut left_n = 0;
            let mut left_pos = 0;
            for threshold in candidates {
                while cursor < n && values[cursor].0 <= threshold {
                    left_n += 1;
                    if values[cursor].1 {
                        left_pos += 1;
                    }
                    cursor += 1;
                }
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }
                let weighted = (left_n as f64 * self.criterion.impurity(left_pos, left_n)
                    + right_n as f64 * self.criterion.impurity(n_pos - left_pos, right_n))
                    / n as f64;
                let gain = parent - weighted;
                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let rows: Vec<usize> = (0..x.nrows()).collect();
        self.fit_rows(x, y, &rows)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;
        Ok(x.rows().into_iter().map(|row| root.predict_row(row)).collect())
    }

    fn is_finite(&self) -> bool {
        self.root.as_ref().map_or(true, TreeNode::is_finite)
    }
}
