//! Integration test: compare, tune and finalize with run logging

use churn_pipeline::data::{Column, Table};
use churn_pipeline::tracking::{ModelUri, RunStatus, TrackingClient, TrackingDestination};
use churn_pipeline::training::{
    ChurnModel, ClassificationExperiment, Metric, ModelKind, SetupConfig, HOLDOUT_DIGEST_PARAM,
    MODEL_ID_TAG, SOURCE_TAG, TRAINING_TIME_METRIC,
};

fn churn_table() -> Table {
    let n = 40;
    let tenure: Vec<Option<f64>> = (0..n).map(|i| Some(((i * 7) % 72) as f64)).collect();
    let monthly: Vec<Option<f64>> = (0..n).map(|i| Some(20.0 + ((i * 13) % 100) as f64)).collect();
    let contract: Vec<Option<String>> = (0..n)
        .map(|i| Some(["Month-to-month", "One year", "Two year"][i % 3].to_string()))
        .collect();
    let churn: Vec<Option<String>> = tenure
        .iter()
        .map(|t| Some(if t.unwrap_or(0.0) < 24.0 { "Yes" } else { "No" }.to_string()))
        .collect();

    Table::new(vec![
        Column::numeric("tenure", tenure),
        Column::numeric("monthly_charges", monthly),
        Column::categorical("contract", contract),
        Column::categorical("churn", churn),
    ])
    .unwrap()
}

fn local_client(dir: &tempfile::TempDir) -> TrackingClient {
    TrackingClient::new(&TrackingDestination::Local {
        root: dir.path().join("mlruns"),
    })
    .unwrap()
}

#[test]
fn test_compare_ranks_candidates() {
    let config = SetupConfig::new("churn", 0.75, 42).with_fold(4);
    let experiment = ClassificationExperiment::setup(&churn_table(), config).unwrap();
    let kinds = [ModelKind::Dummy, ModelKind::DecisionTree, ModelKind::LogisticRegression];

    let top = experiment.compare_models(&kinds, Metric::Accuracy, 2).unwrap();
    assert_eq!(top.len(), 2);
    assert!(top[0].cv_scores.accuracy >= top[1].cv_scores.accuracy);
    assert!(top.iter().all(|c| c.run_id.is_none()));

    // tenure alone separates the classes
    assert_ne!(top[0].spec.kind, ModelKind::Dummy);
}

#[test]
fn test_tune_never_gets_worse() {
    let config = SetupConfig::new("churn", 0.75, 7).with_fold(3);
    let experiment = ClassificationExperiment::setup(&churn_table(), config).unwrap();
    let best = experiment
        .compare_models(&[ModelKind::KNN], Metric::F1, 1)
        .unwrap()
        .remove(0);

    let tuned = experiment.tune_model(&best, 5, Metric::F1).unwrap();
    assert!(tuned.cv_scores.f1 >= best.cv_scores.f1);
    assert_eq!(tuned.spec.kind, ModelKind::KNN);
}

#[test]
fn test_every_model_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(&dir);
    let config = SetupConfig::new("churn", 0.75, 42).with_fold(3);
    let experiment = ClassificationExperiment::setup(&churn_table(), config)
        .unwrap()
        .with_tracking(client.clone())
        .unwrap()
        .with_data_digest("abc123");

    let top = experiment
        .compare_models(&[ModelKind::NaiveBayes, ModelKind::DecisionTree], Metric::Accuracy, 1)
        .unwrap();
    let tuned = experiment.tune_model(&top[0], 3, Metric::Accuracy).unwrap();
    let finalized = experiment.finalize_model(&tuned).unwrap();

    let holdout_digest = experiment.holdout_split().digest();
    let exp_id = client.experiment_id("telco-churn-prediction").unwrap().unwrap();
    let runs = client.search_runs(&[exp_id], None, None).unwrap();
    // two candidates, the tuned model and the final model
    assert_eq!(runs.len(), 4);
    for run in &runs {
        assert_eq!(run.status, RunStatus::Finished);
        assert!(run.metric("Accuracy").is_some());
        assert!(run.metric(TRAINING_TIME_METRIC).is_some());
        assert_eq!(run.param(HOLDOUT_DIGEST_PARAM), Some(holdout_digest.as_str()));
        assert_eq!(run.param("data_digest"), Some("abc123"));
        assert!(run.tags.contains_key(MODEL_ID_TAG));
    }

    let final_id = finalized.run_id.clone().unwrap();
    let final_run = client.get_run(&final_id).unwrap();
    assert_eq!(final_run.tags.get(SOURCE_TAG).map(String::as_str), Some("finalize_model"));

    let uri = finalized.model_uri.clone().unwrap();
    assert_eq!(uri.to_string(), format!("runs:/{}/model", final_id));

    let parsed: ModelUri = uri.to_string().parse().unwrap();
    let reloaded = ChurnModel::load_from(&client, &parsed).unwrap();
    let (features, _) = churn_table().split_target("churn").unwrap();
    assert_eq!(
        reloaded.predict_table(&features).unwrap(),
        finalized.model.predict_table(&features).unwrap()
    );
}

#[test]
fn test_ignored_features_are_dropped() {
    let config = SetupConfig::new("churn", 0.75, 42)
        .with_fold(3)
        .with_ignore_features(vec!["contract".to_string(), "monthly_charges".to_string()]);
    let experiment = ClassificationExperiment::setup(&churn_table(), config).unwrap();
    let best = experiment
        .compare_models(&[ModelKind::DecisionTree], Metric::Accuracy, 1)
        .unwrap()
        .remove(0);
    assert_eq!(best.model.features.n_outputs(), 1);

    // ignored columns are not looked up at prediction time
    let (features, _) = churn_table().split_target("churn").unwrap();
    assert_eq!(best.model.predict_table(&features).unwrap().len(), 40);
}
