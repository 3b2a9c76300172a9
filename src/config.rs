//! Pipeline configuration (`params.yaml`)

use crate::error::{PipelineError, Result};
use crate::training::{Metric, ModelKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the tracking experiment shared by trainer and evaluator
pub const EXPERIMENT_NAME: &str = "telco-churn-prediction";

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "params.yaml";

/// Raw dataset read by the preparer
pub const RAW_DATA_PATH: &str = "data/raw/telco_churn.csv";

/// Processed dataset written by the preparer
pub const PROCESSED_DATA_PATH: &str = "data/processed/telco_churn_processed.csv";

fn default_target() -> String {
    "churn".to_string()
}

fn default_fold() -> usize {
    10
}

fn default_n_select() -> usize {
    3
}

fn default_tune_iterations() -> usize {
    10
}

fn default_selection_metric() -> String {
    "Accuracy".to_string()
}

fn default_local_tracking_dir() -> PathBuf {
    PathBuf::from("mlruns")
}

/// Flat key-value configuration shared by every stage.
///
/// Loaded fresh by each stage and never mutated. The trainer and the
/// evaluator must read the same document for the holdout split to match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Send runs to the remote tracking server instead of the local store
    #[serde(default)]
    pub track_to_dagshub: bool,

    /// Remote tracking endpoint (required when `track_to_dagshub` is set)
    #[serde(default)]
    pub dagshub_tracking_uri: Option<String>,

    /// Dataset read by the trainer and the evaluator
    pub data_read_csv: PathBuf,

    /// Fraction of rows used for training, in (0, 1)
    pub train_size: f64,

    /// Seed for the holdout split, CV folds and model randomness
    pub seed: u64,

    /// Candidate model ids for the comparison
    pub models_to_compare: Vec<String>,

    /// Metric used to rank candidates and to drive tuning
    pub metric: String,

    /// Label column
    #[serde(default = "default_target")]
    pub target: String,

    /// Number of cross-validation folds
    #[serde(default = "default_fold")]
    pub fold: usize,

    /// How many top candidates the comparison returns
    #[serde(default = "default_n_select")]
    pub n_select: usize,

    /// Random-search iterations for tuning
    #[serde(default = "default_tune_iterations")]
    pub tune_iterations: usize,

    /// Metric the evaluator uses to pick the best run
    #[serde(default = "default_selection_metric")]
    pub selection_metric: String,

    /// Root directory of the local tracking store
    #[serde(default = "default_local_tracking_dir")]
    pub local_tracking_dir: PathBuf,

    /// Columns excluded from the feature set
    #[serde(default)]
    pub ignore_features: Vec<String>,
}

impl PipelineParams {
    /// Load and validate a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let params: Self = serde_yaml::from_str(yaml)?;
        params.validate()?;
        Ok(params)
    }

    /// Check value ranges and catalog names
    pub fn validate(&self) -> Result<()> {
        if !(self.train_size > 0.0 && self.train_size < 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "train_size".to_string(),
                value: self.train_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.fold < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "fold".to_string(),
                value: self.fold.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.n_select == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_select".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.target.trim().is_empty() {
            return Err(PipelineError::ConfigError("target must not be empty".to_string()));
        }
        if self.track_to_dagshub
            && self
                .dagshub_tracking_uri
                .as_deref()
                .map_or(true, |uri| uri.trim().is_empty())
        {
            return Err(PipelineError::ConfigError(
                "dagshub_tracking_uri is required when track_to_dagshub is true".to_string(),
            ));
        }

        self.model_kinds()?;
        self.ranking_metric()?;
        self.run_selection_metric()?;
        Ok(())
    }

    /// Candidate models, in configuration order
    pub fn model_kinds(&self) -> Result<Vec<ModelKind>> {
        if self.models_to_compare.is_empty() {
            return Err(PipelineError::ConfigError(
                "models_to_compare must list at least one model".to_string(),
            ));
        }
        self.models_to_compare.iter().map(|id| id.parse()).collect()
    }

    /// Metric used by the comparison and by tuning
    pub fn ranking_metric(&self) -> Result<Metric> {
        self.metric.parse()
    }

    /// Metric used by the evaluator to select a run
    pub fn run_selection_metric(&self) -> Result<Metric> {
        self.selection_metric.parse()
    }
}
