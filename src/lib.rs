//! Churn Pipeline - three-stage experiment pipeline for telco churn prediction
//!
//! The pipeline is made of three independently runnable stages that talk to
//! each other through files on disk and an experiment-tracking store:
//!
//! 1. **prepare** - copy the raw dataset to the processed location
//! 2. **train** - compare candidate classifiers, tune the best one, finalize
//!    it and log every run (params, metrics, model artifact)
//! 3. **evaluate** - pick the best run, reload its model and score it on the
//!    holdout partition, appending the final metrics to that same run
//!
//! # Modules
//!
//! - [`config`] - `params.yaml` loading and validation
//! - [`data`] - CSV IO, the in-memory [`data::Table`] and the shared holdout split
//! - [`preprocessing`] - label encoding and the feature pipeline
//! - [`training`] - classifier catalog, cross-validation, tuning and the
//!   AutoML experiment driver
//! - [`tracking`] - experiment tracking (local file store, MLflow REST store)
//! - [`stages`] - the three pipeline stages
//! - [`cli`] - command-line entry points

pub mod error;
pub mod config;
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod tracking;
pub mod stages;
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, Result};

    pub use crate::config::{PipelineParams, EXPERIMENT_NAME};

    pub use crate::data::{HoldoutSplit, Table, Column, ColumnData};

    pub use crate::preprocessing::{FeaturePipeline, LabelEncoder};

    pub use crate::training::{
        ChurnModel, ClassificationExperiment, ClassificationScores, EstimatorSpec, Metric,
        ModelKind, SetupConfig,
    };

    pub use crate::tracking::{
        ModelUri, RunRecord, RunStatus, TrackingClient, TrackingDestination, TrackingStore,
    };

    pub use crate::stages::{evaluate::EvaluationReport, train::TrainReport, prepare::PrepareReport};
}
