//! Classifier trait and the serializable set of fitted classifiers

use super::decision_tree::DecisionTree;
use super::dummy::DummyClassifier;
use super::knn::KNNClassifier;
use super::linear_models::{LogisticRegression, RidgeClassifier};
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::RandomForest;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Binary classifier over a dense design matrix. Labels are `0.0` / `1.0`.
pub trait Classifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class for each row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Whether every fitted parameter is a finite number
    fn is_finite(&self) -> bool;
}

/// Check that `x` and `y` agree and are not empty
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::TrainingError(
            "cannot fit on zero samples".to_string(),
        ));
    }
    Ok(())
}

/// Check the feature count at prediction time
pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(PipelineError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Fraction of positive labels
pub(crate) fn positive_rate(y: &Array1<f64>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().filter(|&&v| v > 0.5).count() as f64 / y.len() as f64
}

/// Fitted classifier variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    LogisticRegression(LogisticRegression),
    RidgeClassifier(RidgeClassifier),
    KNNClassifier(KNNClassifier),
    GaussianNaiveBayes(GaussianNaiveBayes),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    Dummy(DummyClassifier),
}

impl TrainedClassifier {
    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedClassifier::LogisticRegression(m) => m,
            TrainedClassifier::RidgeClassifier(m) => m,
            TrainedClassifier::KNNClassifier(m) => m,
            TrainedClassifier::GaussianNaiveBayes(m) => m,
            TrainedClassifier::DecisionTree(m) => m,
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::Dummy(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedClassifier::LogisticRegression(m) => m,
            TrainedClassifier::RidgeClassifier(m) => m,
            TrainedClassifier::KNNClassifier(m) => m,
            TrainedClassifier::GaussianNaiveBayes(m) => m,
            TrainedClassifier::DecisionTree(m) => m,
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::Dummy(m) => m,
        }
    }
}

impl Classifier for TrainedClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict_proba(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_finite(&self) -> bool {
        self.inner().is_finite()
    }
}
