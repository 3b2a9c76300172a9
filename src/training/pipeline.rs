//! Trained churn model: label encoder + feature pipeline + classifier
//!
//! This is the unit persisted as a run's model artifact. It is stored as
//! JSON under `model/model.json` and addressed as `runs:/<run_id>/model`.

use super::catalog::EstimatorSpec;
use super::classifier::{Classifier, TrainedClassifier};
use crate::data::Table;
use crate::error::{PipelineError, Result};
use crate::preprocessing::{FeaturePipeline, LabelEncoder};
use crate::tracking::{ModelUri, TrackingClient};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Artifact directory holding the serialized model
pub const MODEL_ARTIFACT_DIR: &str = "model";

/// File name of the serialized model inside [`MODEL_ARTIFACT_DIR`]
pub const MODEL_FILE_NAME: &str = "model.json";

/// Serializable trained pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnModel {
    pub estimator: EstimatorSpec,
    pub target: String,
    pub ignore_features: Vec<String>,
    pub label_encoder: LabelEncoder,
    pub features: FeaturePipeline,
    pub classifier: TrainedClassifier,
    pub created_at: DateTime<Utc>,
}

impl ChurnModel {
    /// Catalog id of the underlying estimator
    pub fn model_id(&self) -> &'static str {
        self.estimator.kind.id()
    }

    /// Positive-class probability for every row of `table`.
    ///
    /// Columns are looked up by name, so the label column and any extra
    /// columns are ignored.
    pub fn predict_proba_table(&self, table: &Table) -> Result<Array1<f64>> {
        let x = self.features.transform(table)?;
        self.classifier.predict_proba(&x)
    }

    /// Encoded hard predictions (`1.0` = positive label)
    pub fn predict_table(&self, table: &Table) -> Result<Array1<f64>> {
        let x = self.features.transform(table)?;
        self.classifier.predict(&x)
    }

    /// Fail when a fitted parameter is NaN or infinite. JSON has no
    /// encoding for those, so such a model could never be reloaded.
    pub fn check_finite(&self) -> Result<()> {
        if !self.features.is_finite() {
            return Err(PipelineError::TrainingError(
                "feature pipeline has non-finite statistics".to_string(),
            ));
        }
        if !self.classifier.is_finite() {
            return Err(PipelineError::TrainingError(format!(
                "{} model has non-finite parameters",
                self.model_id()
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_finite()?;
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Artifact path of the model file for a model URI path
    fn artifact_file(uri_path: &str) -> String {
        format!("{}/{}", uri_path.trim_end_matches('/'), MODEL_FILE_NAME)
    }

    /// Store the model as an artifact of `run_id`
    pub fn log_to(&self, client: &TrackingClient, run_id: &str) -> Result<ModelUri> {
        let bytes = self.to_bytes()?;
        client.log_artifact(run_id, &Self::artifact_file(MODEL_ARTIFACT_DIR), &bytes)?;
        debug!(run_id, bytes = bytes.len(), "model artifact logged");
        Ok(ModelUri::for_run(run_id, MODEL_ARTIFACT_DIR))
    }

    /// Load a model previously stored with [`ChurnModel::log_to`]
    pub fn load_from(client: &TrackingClient, uri: &ModelUri) -> Result<Self> {
        let bytes = client
            .load_artifact(&uri.run_id, &Self::artifact_file(&uri.path))
            .map_err(|e| match e {
                PipelineError::TrackingError(msg) => {
                    PipelineError::TrackingError(format!("cannot load model {}: {}", uri, msg))
                }
                other => other,
            })?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use crate::training::catalog::ModelKind;
    use crate::training::linear_models::LogisticRegression;
    use crate::tracking::LocalStore;

    fn fitted() -> (ChurnModel, Table) {
        let table = Table::new(vec![
            Column::numeric("tenure", vec![Some(1.0), Some(40.0), Some(2.0), Some(60.0)]),
            Column::categorical(
                "contract",
                vec![
                    Some("Month-to-month".to_string()),
                    Some("Two year".to_string()),
                    Some("Month-to-month".to_string()),
                    Some("Two year".to_string()),
                ],
            ),
            Column::categorical(
                "churn",
                vec![
                    Some("Yes".to_string()),
                    Some("No".to_string()),
                    Some("Yes".to_string()),
                    Some("No".to_string()),
                ],
            ),
        ])
        .unwrap();

        let (features_table, label) = table.split_target("churn").unwrap();
        let label_encoder = LabelEncoder::fit(&label).unwrap();
        let features = FeaturePipeline::fit(&features_table).unwrap();
        let x = features.transform(&features_table).unwrap();
        let y = label_encoder.transform(&label).unwrap();

        let estimator = EstimatorSpec::new(ModelKind::DecisionTree);
        let mut classifier = estimator.build(42).unwrap();
        classifier.fit(&x, &y).unwrap();

        let model = ChurnModel {
            estimator,
            target: "churn".to_string(),
            ignore_features: Vec::new(),
            label_encoder,
            features,
            classifier,
            created_at: Utc::now(),
        };
        (model, table)
    }

    #[test]
    fn test_predicts_ignoring_label_column() {
        let (model, table) = fitted();
        let pred = model.predict_table(&table).unwrap();
        assert_eq!(pred.to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bytes_preserve_predictions() {
        let (model, table) = fitted();
        let restored = ChurnModel::from_bytes(&model.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.model_id(), "dt");
        assert_eq!(
            restored.predict_proba_table(&table).unwrap(),
            model.predict_proba_table(&table).unwrap()
        );
    }

    #[test]
    fn test_non_finite_model_is_not_logged() {
        let (fitted_model, _) = fitted();
        let n_features = fitted_model.features.n_outputs();
        let mut lr = LogisticRegression::new();
        lr.coefficients = Some(Array1::from_elem(n_features, f64::NAN));
        lr.intercept = f64::NAN;
        let model = ChurnModel {
            estimator: EstimatorSpec::new(ModelKind::LogisticRegression),
            classifier: TrainedClassifier::LogisticRegression(lr),
            ..fitted_model
        };

        let dir = tempfile::tempdir().unwrap();
        let client = TrackingClient::from_store(LocalStore::new(dir.path()).unwrap());
        let exp = client.get_or_create_experiment("churn").unwrap();
        let run = client.start_run(&exp, "lr", &Default::default()).unwrap();

        let err = model.log_to(&client, &run.run_id).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
        assert!(client.get_run(&run.run_id).unwrap().artifacts.is_empty());
    }

    #[test]
    fn test_artifact_file_path() {
        assert_eq!(ChurnModel::artifact_file("model"), "model/model.json");
        assert_eq!(ChurnModel::artifact_file("model/"), "model/model.json");
    }
}
