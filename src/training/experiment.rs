//! AutoML classification experiment: setup, compare, tune, finalize
//!
//! Every trained model is logged as its own run when tracking is enabled,
//! so persisting a model is a side effect of training it.

use super::catalog::{EstimatorSpec, ModelKind};
use super::classifier::Classifier;
use super::cross_validation::{cross_validate, CVSplit, StratifiedKFold};
use super::metrics::{ClassificationScores, Metric};
use super::pipeline::ChurnModel;
use super::tuning::random_search;
use crate::config::{PipelineParams, EXPERIMENT_NAME};
use crate::data::{HoldoutSplit, Table};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{FeaturePipeline, LabelEncoder};
use crate::tracking::{ModelUri, RunStatus, TrackingClient};
use chrono::Utc;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Run param holding the holdout fingerprint
pub const HOLDOUT_DIGEST_PARAM: &str = "holdout_digest";

/// Run param holding the dataset file fingerprint
pub const DATA_DIGEST_PARAM: &str = "data_digest";

/// Metric key for the training time in seconds
pub const TRAINING_TIME_METRIC: &str = "TT";

/// Run tag naming the experiment step that produced the run
pub const SOURCE_TAG: &str = "Source";

/// Run tag holding the catalog model id
pub const MODEL_ID_TAG: &str = "model_id";

/// Experiment settings
#[derive(Debug, Clone, PartialEq)]
pub struct SetupConfig {
    pub target: String,
    pub train_size: f64,
    pub seed: u64,
    pub fold: usize,
    pub ignore_features: Vec<String>,
    pub experiment_name: String,
}

impl SetupConfig {
    pub fn new(target: impl Into<String>, train_size: f64, seed: u64) -> Self {
        Self {
            target: target.into(),
            train_size,
            seed,
            fold: 10,
            ignore_features: Vec::new(),
            experiment_name: EXPERIMENT_NAME.to_string(),
        }
    }

    pub fn with_fold(mut self, fold: usize) -> Self {
        self.fold = fold;
        self
    }

    pub fn with_ignore_features(mut self, names: Vec<String>) -> Self {
        self.ignore_features = names;
        self
    }

    pub fn from_params(params: &PipelineParams) -> Self {
        Self::new(params.target.clone(), params.train_size, params.seed)
            .with_fold(params.fold)
            .with_ignore_features(params.ignore_features.clone())
    }
}

/// A model trained during comparison or tuning
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub spec: EstimatorSpec,
    /// Mean cross-validation scores
    pub cv_scores: ClassificationScores,
    /// Model refitted on the whole training partition
    pub model: ChurnModel,
    pub training_secs: f64,
    /// Run the candidate was logged to
    pub run_id: Option<String>,
}

/// The model produced by [`ClassificationExperiment::finalize_model`]
#[derive(Debug, Clone)]
pub struct FinalizedModel {
    pub model: ChurnModel,
    pub cv_scores: ClassificationScores,
    pub run_id: Option<String>,
    pub model_uri: Option<ModelUri>,
}

struct Autolog {
    client: TrackingClient,
    experiment_id: String,
}

/// Binary classification experiment over one dataset
pub struct ClassificationExperiment {
    config: SetupConfig,
    split: HoldoutSplit,
    label_encoder: LabelEncoder,
    features: FeaturePipeline,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    folds: Vec<CVSplit>,
    data_digest: Option<String>,
    autolog: Option<Autolog>,
}

impl ClassificationExperiment {
    /// Split the data and fit the preprocessing on the training partition
    pub fn setup(table: &Table, config: SetupConfig) -> Result<Self> {
        let (features_table, label) = table.split_target(&config.target)?;
        let ignored: Vec<&str> = config.ignore_features.iter().map(String::as_str).collect();
        let features_table = features_table.without(&ignored);
        if features_table.n_cols() == 0 {
            return Err(PipelineError::DataError(
                "no feature columns left after removing the target".to_string(),
            ));
        }

        let split = HoldoutSplit::new(table.n_rows(), config.train_size, config.seed)?;

        // fitted on every row so a class absent from training still decodes
        let label_encoder = LabelEncoder::fit(&label)?;

        let train_table = features_table.take(&split.train_indices);
        let features = FeaturePipeline::fit(&train_table)?;
        let x_train = features.transform(&train_table)?;
        let y_train = label_encoder.transform(&label.take(&split.train_indices))?;

        let folds = StratifiedKFold::new(config.fold, config.seed).split(&y_train)?;

        info!(
            rows = table.n_rows(),
            train_rows = split.train_indices.len(),
            holdout_rows = split.holdout_indices.len(),
            features = features.n_outputs(),
            folds = folds.len(),
            "experiment setup"
        );

        Ok(Self {
            config,
            split,
            label_encoder,
            features,
            x_train,
            y_train,
            folds,
            data_digest: None,
            autolog: None,
        })
    }

    /// Log every trained model to `client`
    pub fn with_tracking(mut self, client: TrackingClient) -> Result<Self> {
        let experiment_id = client.get_or_create_experiment(&self.config.experiment_name)?;
        info!(
            experiment = %self.config.experiment_name,
            experiment_id = %experiment_id,
            endpoint = %client.endpoint(),
            "autologging enabled"
        );
        self.autolog = Some(Autolog {
            client,
            experiment_id,
        });
        Ok(self)
    }

    /// Record the dataset fingerprint on every run
    pub fn with_data_digest(mut self, digest: impl Into<String>) -> Self {
        self.data_digest = Some(digest.into());
        self
    }

    pub fn holdout_split(&self) -> &HoldoutSplit {
        &self.split
    }

    pub fn config(&self) -> &SetupConfig {
        &self.config
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    fn fit_full(&self, spec: &EstimatorSpec) -> Result<ChurnModel> {
        let mut classifier = spec.build(self.config.seed)?;
        classifier.fit(&self.x_train, &self.y_train)?;
        let model = ChurnModel {
            estimator: spec.clone(),
            target: self.config.target.clone(),
            ignore_features: self.config.ignore_features.clone(),
            label_encoder: self.label_encoder.clone(),
            features: self.features.clone(),
            classifier,
            created_at: Utc::now(),
        };
        model.check_finite()?;
        Ok(model)
    }

    /// Cross-validate `spec`, refit it on the training partition and log it
    fn train_candidate(&self, spec: EstimatorSpec, source: &str) -> Result<CandidateModel> {
        let started = Instant::now();
        let cv = cross_validate(
            &spec,
            &self.x_train,
            &self.y_train,
            &self.folds,
            self.config.seed,
        )?;
        let model = self.fit_full(&spec)?;
        let training_secs = started.elapsed().as_secs_f64();

        let (run_id, _) = self.log_run(source, &model, &cv.mean, training_secs)?.unzip();
        Ok(CandidateModel {
            spec,
            cv_scores: cv.mean,
            model,
            training_secs,
            run_id,
        })
    }

    /// Run params shared by every run of this experiment
    fn common_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(HOLDOUT_DIGEST_PARAM.to_string(), self.split.digest());
        if let Some(digest) = &self.data_digest {
            params.insert(DATA_DIGEST_PARAM.to_string(), digest.clone());
        }
        params.insert("target".to_string(), self.config.target.clone());
        params.insert("train_size".to_string(), self.config.train_size.to_string());
        params.insert("session_id".to_string(), self.config.seed.to_string());
        params.insert("fold".to_string(), self.folds.len().to_string());
        params
    }

    /// Log one trained model as a finished run
    fn log_run(
        &self,
        source: &str,
        model: &ChurnModel,
        scores: &ClassificationScores,
        training_secs: f64,
    ) -> Result<Option<(String, ModelUri)>> {
        let Some(autolog) = &self.autolog else {
            return Ok(None);
        };
        let client = &autolog.client;
        let kind = model.estimator.kind;

        let mut tags = BTreeMap::new();
        tags.insert(SOURCE_TAG.to_string(), source.to_string());
        tags.insert(MODEL_ID_TAG.to_string(), kind.id().to_string());
        let run = client.start_run(&autolog.experiment_id, kind.display_name(), &tags)?;

        let logged = (|| -> Result<ModelUri> {
            let mut params = self.common_params();
            params.extend(model.estimator.param_strings());
            client.log_params(&run.run_id, &params)?;

            let mut metrics = scores.to_map();
            metrics.insert(TRAINING_TIME_METRIC.to_string(), training_secs);
            client.log_metrics(&run.run_id, &metrics, 0)?;

            model.log_to(client, &run.run_id)
        })();

        match logged {
            Ok(uri) => {
                client.end_run(&run.run_id, RunStatus::Finished)?;
                info!(run_id = %run.run_id, model = kind.id(), source, "run logged");
                Ok(Some((run.run_id, uri)))
            }
            Err(e) => {
                if let Err(end_err) = client.end_run(&run.run_id, RunStatus::Failed) {
                    warn!(run_id = %run.run_id, error = %end_err, "could not mark run as failed");
                }
                Err(e)
            }
        }
    }

    /// Cross-validate every candidate and return the best `n_select`,
    /// ranked by `sort` descending. Ties keep the `include` order.
    pub fn compare_models(
        &self,
        include: &[ModelKind],
        sort: Metric,
        n_select: usize,
    ) -> Result<Vec<CandidateModel>> {
        if include.is_empty() {
            return Err(PipelineError::ConfigError(
                "no candidate models to compare".to_string(),
            ));
        }

        let mut candidates = Vec::with_capacity(include.len());
        for &kind in include {
            let candidate = self.train_candidate(EstimatorSpec::new(kind), "compare_models")?;
            info!(
                model = kind.id(),
                metric = %sort,
                score = candidate.cv_scores.get(sort),
                secs = candidate.training_secs,
                "candidate scored"
            );
            candidates.push(candidate);
        }

        candidates.sort_by(|a, b| {
            b.cv_scores
                .get(sort)
                .partial_cmp(&a.cv_scores.get(sort))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(n_select.max(1));
        Ok(candidates)
    }

    /// Random-search the candidate's hyperparameters on the same folds.
    /// Returns the original estimator when no trial beats it.
    pub fn tune_model(
        &self,
        candidate: &CandidateModel,
        n_iter: usize,
        optimize: Metric,
    ) -> Result<CandidateModel> {
        let started = Instant::now();
        let study = random_search(
            &candidate.spec,
            &self.x_train,
            &self.y_train,
            &self.folds,
            n_iter,
            optimize,
            self.config.seed,
        )?;
        if !study.improved {
            info!(model = candidate.spec.kind.id(), "tuning kept the original hyperparameters");
        }

        let (spec, cv_scores, model) = match self.fit_full(&study.best_spec) {
            Ok(model) => (study.best_spec, study.best_cv.mean, model),
            Err(e) if study.improved => {
                warn!(
                    model = candidate.spec.kind.id(),
                    error = %e,
                    "tuned estimator failed to refit, keeping the original"
                );
                (candidate.spec.clone(), candidate.cv_scores, candidate.model.clone())
            }
            Err(e) => return Err(e),
        };
        let training_secs = started.elapsed().as_secs_f64();
        let (run_id, _) = self
            .log_run("tune_model", &model, &cv_scores, training_secs)?
            .unzip();

        Ok(CandidateModel {
            spec,
            cv_scores,
            model,
            training_secs,
            run_id,
        })
    }

    /// Refit the estimator on the whole training partition and log the
    /// final run
    pub fn finalize_model(&self, candidate: &CandidateModel) -> Result<FinalizedModel> {
        let started = Instant::now();
        let model = self.fit_full(&candidate.spec)?;
        let training_secs = started.elapsed().as_secs_f64();

        let (run_id, model_uri) = self
            .log_run("finalize_model", &model, &candidate.cv_scores, training_secs)?
            .unzip();

        info!(
            model = candidate.spec.kind.id(),
            run_id = run_id.as_deref().unwrap_or("-"),
            "model finalized"
        );
        Ok(FinalizedModel {
            model,
            cv_scores: candidate.cv_scores,
            run_id,
            model_uri,
        })
    }
}
