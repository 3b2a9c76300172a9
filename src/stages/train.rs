//! Training stage: compare, tune and finalize

use crate::config::PipelineParams;
use crate::data::{file_digest, load_table};
use crate::error::{PipelineError, Result};
use crate::tracking::TrackingClient;
use crate::training::{ClassificationExperiment, ClassificationScores, Metric, SetupConfig};
use tracing::info;

/// Summary of a training run
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// `(model id, ranking score)` of the selected candidates, best first
    pub leaderboard: Vec<(String, f64)>,
    pub metric: Metric,
    /// Id of the finalized model
    pub final_model: String,
    pub final_scores: ClassificationScores,
    pub final_run_id: Option<String>,
    pub holdout_digest: String,
}

/// Train on `params.data_read_csv` and log every model to `client`
pub fn run(params: &PipelineParams, client: &TrackingClient) -> Result<TrainReport> {
    let kinds = params.model_kinds()?;
    let metric = params.ranking_metric()?;

    let table = load_table(&params.data_read_csv)?;
    let data_digest = file_digest(&params.data_read_csv)?;
    info!(
        path = %params.data_read_csv.display(),
        rows = table.n_rows(),
        columns = table.n_cols(),
        "training data loaded"
    );

    let experiment = ClassificationExperiment::setup(&table, SetupConfig::from_params(params))?
        .with_tracking(client.clone())?
        .with_data_digest(data_digest);

    let top = experiment.compare_models(&kinds, metric, params.n_select)?;
    let leaderboard = top
        .iter()
        .map(|c| (c.spec.kind.id().to_string(), c.cv_scores.get(metric)))
        .collect();

    let best = top.first().ok_or_else(|| {
        PipelineError::TrainingError("model comparison returned no candidates".to_string())
    })?;
    info!(model = best.spec.kind.id(), score = best.cv_scores.get(metric), "best candidate");

    let tuned = experiment.tune_model(best, params.tune_iterations, metric)?;
    let finalized = experiment.finalize_model(&tuned)?;

    Ok(TrainReport {
        leaderboard,
        metric,
        final_model: finalized.model.model_id().to_string(),
        final_scores: finalized.cv_scores,
        final_run_id: finalized.run_id,
        holdout_digest: experiment.holdout_split().digest(),
    })
}
