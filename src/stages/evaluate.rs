//! Evaluation stage: score the best run's model on the holdout partition

use crate::config::{PipelineParams, EXPERIMENT_NAME};
use crate::data::{file_digest, load_table, HoldoutSplit};
use crate::error::{PipelineError, Result};
use crate::tracking::{ModelUri, RunRecord, TrackingClient};
use crate::training::{
    ChurnModel, Confusion, DATA_DIGEST_PARAM, HOLDOUT_DIGEST_PARAM, MODEL_ARTIFACT_DIR,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Holdout metrics appended to the selected run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl FinalMetrics {
    pub fn from_confusion(c: &Confusion) -> Self {
        Self {
            accuracy: c.accuracy(),
            precision: c.precision(),
            recall: c.recall(),
            f1: c.f1(),
        }
    }

    /// Metric map keyed as logged on the run
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            ("final_accuracy", self.accuracy),
            ("final_precision", self.precision),
            ("final_recall", self.recall),
            ("final_f1", self.f1),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Outcome of an evaluation
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub run_id: String,
    pub run_name: String,
    /// Name and value of the metric the run was selected by
    pub selection_metric: String,
    pub selection_value: Option<f64>,
    pub holdout_rows: usize,
    pub metrics: FinalMetrics,
}

/// Fail when the run was trained on a different split or dataset
fn verify_run(run: &RunRecord, split: &HoldoutSplit, data_digest: &str) -> Result<()> {
    let checks = [
        (HOLDOUT_DIGEST_PARAM, split.digest(), "holdout partition differs"),
        (DATA_DIGEST_PARAM, data_digest.to_string(), "dataset file differs"),
    ];
    for (param, expected, reason) in checks {
        match run.param(param) {
            Some(recorded) if recorded != expected => {
                return Err(PipelineError::SplitMismatch {
                    run_id: run.run_id.clone(),
                    reason: format!("{} ({} {} vs {})", reason, param, recorded, expected),
                });
            }
            Some(_) => {}
            None => warn!(run_id = %run.run_id, param, "run has no fingerprint, skipping check"),
        }
    }
    Ok(())
}

/// Pick the best run, score its model on the holdout rows and append the
/// `final_*` metrics to that run
pub fn run(params: &PipelineParams, client: &TrackingClient) -> Result<EvaluationReport> {
    let selection_metric = params.run_selection_metric()?;

    let table = load_table(&params.data_read_csv)?;
    let data_digest = file_digest(&params.data_read_csv)?;
    let split = HoldoutSplit::new(table.n_rows(), params.train_size, params.seed)?;

    let best = client.best_run(EXPERIMENT_NAME, selection_metric.name())?;
    let selection_value = best.metric(selection_metric.name());
    info!(
        run_id = %best.run_id,
        run_name = %best.run_name,
        metric = %selection_metric,
        value = selection_value.unwrap_or(f64::NAN),
        "best run selected"
    );
    verify_run(&best, &split, &data_digest)?;

    let uri = ModelUri::for_run(&best.run_id, MODEL_ARTIFACT_DIR);
    let model = ChurnModel::load_from(client, &uri)?;

    let holdout = table.take(&split.holdout_indices);
    let (features, label) = holdout.split_target(&model.target)?;
    let y_true = model.label_encoder.transform(&label)?;
    let y_pred = model.predict_table(&features)?;

    let metrics = FinalMetrics::from_confusion(&Confusion::from_predictions(&y_true, &y_pred));
    client.log_metrics(&best.run_id, &metrics.to_map(), 0)?;
    info!(
        run_id = %best.run_id,
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1 = metrics.f1,
        "final metrics logged"
    );

    Ok(EvaluationReport {
        run_id: best.run_id,
        run_name: best.run_name,
        selection_metric: selection_metric.name().to_string(),
        selection_value,
        holdout_rows: split.holdout_indices.len(),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::RunStatus;

    fn run_with(params: &[(&str, &str)]) -> RunRecord {
        RunRecord {
            run_id: "r1".to_string(),
            experiment_id: "1".to_string(),
            run_name: "dt".to_string(),
            status: RunStatus::Finished,
            start_time: 0,
            end_time: None,
            artifact_uri: String::new(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            tags: BTreeMap::new(),
            metrics: BTreeMap::new(),
            metric_history: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_verify_run() {
        let split = HoldoutSplit::new(10, 0.7, 42).unwrap();
        let digest = split.digest();

        assert!(verify_run(&run_with(&[]), &split, "d").is_ok());
        let recorded =
            run_with(&[(HOLDOUT_DIGEST_PARAM, digest.as_str()), (DATA_DIGEST_PARAM, "d")]);
        assert!(verify_run(&recorded, &split, "d").is_ok());

        let other = HoldoutSplit::new(11, 0.7, 42).unwrap().digest();
        let moved = run_with(&[(HOLDOUT_DIGEST_PARAM, other.as_str())]);
        let err = verify_run(&moved, &split, "d").unwrap_err();
        assert!(matches!(err, PipelineError::SplitMismatch { .. }));

        assert!(verify_run(&run_with(&[(DATA_DIGEST_PARAM, "x")]), &split, "d").is_err());
    }

    #[test]
    fn test_final_metric_keys() {
        let m = FinalMetrics {
            accuracy: 1.0,
            precision: 0.5,
            recall: 0.25,
            f1: 0.0,
        };
        let keys: Vec<String> = m.to_map().into_keys().collect();
        assert_eq!(keys, vec!["final_accuracy", "final_f1", "final_precision", "final_recall"]);
    }
}
