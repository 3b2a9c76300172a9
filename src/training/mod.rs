//! Model training module
//!
//! A compact AutoML engine for binary classification:
//! - Classifier catalog (logistic regression, ridge, KNN, naive Bayes,
//!   decision tree, random forest, extra trees, prior baseline)
//! - Stratified k-fold cross-validation
//! - Random-search hyperparameter tuning
//! - [`ClassificationExperiment`] tying it together with run logging

mod classifier;
mod catalog;
mod experiment;
mod pipeline;
pub mod metrics;
pub mod search_space;
pub mod cross_validation;
pub mod tuning;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod knn;
pub mod naive_bayes;
pub mod dummy;

pub use classifier::{Classifier, TrainedClassifier};
pub use catalog::{EstimatorSpec, ModelKind};
pub use experiment::{
    CandidateModel, ClassificationExperiment, FinalizedModel, SetupConfig, DATA_DIGEST_PARAM,
    HOLDOUT_DIGEST_PARAM, MODEL_ID_TAG, SOURCE_TAG, TRAINING_TIME_METRIC,
};
pub use pipeline::{ChurnModel, MODEL_ARTIFACT_DIR, MODEL_FILE_NAME};
pub use metrics::{ClassificationScores, Confusion, Metric};
pub use search_space::{HyperParams, ParameterValue, SearchSpace};
pub use cross_validation::{CVSplit, StratifiedKFold};
