//! Random-search hyperparameter tuning

use super::catalog::EstimatorSpec;
use super::cross_validation::{cross_validate, CVResult, CVSplit};
use super::metrics::Metric;
use super::search_space::HyperParams;
use crate::error::Result;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a single trial
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub trial_id: usize,
    /// Sampled parameters
    pub params: HyperParams,
    /// Mean CV value of the optimized metric
    pub value: f64,
    pub duration_secs: f64,
}

/// Outcome of a tuning study
#[derive(Debug, Clone)]
pub struct Study {
    pub trials: Vec<TrialResult>,
    /// Best spec found, the starting spec when no trial beat it
    pub best_spec: EstimatorSpec,
    pub best_cv: CVResult,
    /// Whether any trial beat the starting spec
    pub improved: bool,
}

impl Study {
    pub fn best_value(&self, metric: Metric) -> f64 {
        self.best_cv.mean.get(metric)
    }
}

/// Seeded random search over the spec's search space.
///
/// The starting spec is scored first on the same folds; a trial replaces it
/// only when it scores strictly higher on `optimize`.
pub fn random_search(
    base: &EstimatorSpec,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
    n_iter: usize,
    optimize: Metric,
    seed: u64,
) -> Result<Study> {
    let started = Instant::now();
    let mut best_spec = base.clone();
    let mut best_cv = cross_validate(base, x, y, splits, seed)?;
    let mut improved = false;
    let mut trials = Vec::new();

    let space = base.kind.search_space();
    if space.is_empty() {
        debug!(model = base.kind.id(), "empty search space, nothing to tune");
        return Ok(Study {
            trials,
            best_spec,
            best_cv,
            improved,
        });
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    for trial_id in 0..n_iter {
        let trial_start = Instant::now();
        let params = space.sample(&mut rng);
        let spec = base.clone().with_params(params.clone());
        let cv = match cross_validate(&spec, x, y, splits, seed) {
            Ok(cv) => cv,
            Err(e) => {
                warn!(
                    model = base.kind.id(),
                    trial_id,
                    error = %e,
                    "tuning trial failed, skipped"
                );
                continue;
            }
        };
        let value = cv.mean.get(optimize);

        debug!(model = base.kind.id(), trial_id, value, "tuning trial");
        if value > best_cv.mean.get(optimize) {
            best_spec = spec;
            best_cv = cv;
            improved = true;
        }
        trials.push(TrialResult {
            trial_id,
            params,
            value,
            duration_secs: trial_start.elapsed().as_secs_f64(),
        });
    }

    info!(
        model = base.kind.id(),
        trials = trials.len(),
        improved,
        best = best_cv.mean.get(optimize),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "tuning finished"
    );

    Ok(Study {
        trials,
        best_spec,
        best_cv,
        improved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::catalog::ModelKind;
    use crate::training::cross_validation::StratifiedKFold;
    use crate::training::classifier::Classifier;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[0.0], [0.1], [0.2], [0.3], [1.0], [1.1], [1.2], [1.3]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_never_worse_than_start() {
        let (x, y) = data();
        let splits = StratifiedKFold::new(2, 3).split(&y).unwrap();
        let base = EstimatorSpec::new(ModelKind::KNN);
        let start = cross_validate(&base, &x, &y, &splits, 3).unwrap().mean.accuracy;

        let study = random_search(&base, &x, &y, &splits, 5, Metric::Accuracy, 3).unwrap();
        assert_eq!(study.trials.len(), 5);
        assert!(study.best_value(Metric::Accuracy) >= start);
    }

    #[test]
    fn test_tiny_data_tuning_stays_finite() {
        let x = array![[-1.0, 1.0, 0.0, 1.0], [1.0, -1.0, 1.0, 0.0]];
        let y = array![1.0, 0.0];
        let splits = StratifiedKFold::new(10, 1).split(&y).unwrap();
        let base = EstimatorSpec::new(ModelKind::LogisticRegression);

        let study = random_search(&base, &x, &y, &splits, 30, Metric::Accuracy, 1).unwrap();
        assert_eq!(study.trials.len(), 30);

        let mut model = study.best_spec.build(1).unwrap();
        model.fit(&x, &y).unwrap();
        assert!(model.is_finite());
    }

    #[test]
    fn test_dummy_has_nothing_to_tune() {
        let (x, y) = data();
        let splits = StratifiedKFold::new(2, 3).split(&y).unwrap();
        let base = EstimatorSpec::new(ModelKind::Dummy);
        let study = random_search(&base, &x, &y, &splits, 10, Metric::F1, 3).unwrap();
        assert!(study.trials.is_empty());
        assert!(!study.improved);
        assert_eq!(study.best_spec, base);
    }
}
