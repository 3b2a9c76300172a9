//! Integration test: prepare -> train -> evaluate against a local store

use churn_pipeline::config::{PipelineParams, EXPERIMENT_NAME};
use churn_pipeline::stages::{evaluate, prepare, train};
use churn_pipeline::tracking::{TrackingClient, TrackingDestination};
use churn_pipeline::PipelineError;
use std::path::Path;

const TINY: &str = "\
tenure,contract,monthly_charges,churn
1,Month-to-month,70.35,Yes
48,Two year,25.1,No
3,Month-to-month,89.9,Yes
";

const FINAL_KEYS: [&str; 4] = ["final_accuracy", "final_precision", "final_recall", "final_f1"];

struct Workspace {
    dir: tempfile::TempDir,
    params: PipelineParams,
}

impl Workspace {
    fn new(raw_csv: &str, train_size: f64, seed: u64, extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.csv"), raw_csv).unwrap();
        let yaml = format!(
            "track_to_dagshub: false\n\
             data_read_csv: {processed}\n\
             train_size: {train_size}\n\
             seed: {seed}\n\
             models_to_compare: [lr, dt, dummy]\n\
             metric: Accuracy\n\
             tune_iterations: 2\n\
             local_tracking_dir: {mlruns}\n\
             {extra}",
            processed = dir.path().join("processed.csv").display(),
            mlruns = dir.path().join("mlruns").display(),
        );
        let params = PipelineParams::from_yaml_str(&yaml).unwrap();
        Self { dir, params }
    }

    fn raw(&self) -> std::path::PathBuf {
        self.dir.path().join("raw.csv")
    }

    fn client(&self) -> TrackingClient {
        TrackingClient::new(&TrackingDestination::from_params(&self.params).unwrap()).unwrap()
    }

    fn prepare(&self) {
        prepare::run(&self.raw(), Path::new(&self.params.data_read_csv)).unwrap();
    }
}

#[test]
fn test_tiny_dataset_end_to_end() {
    let ws = Workspace::new(TINY, 0.67, 42, "");
    ws.prepare();

    let client = ws.client();
    let trained = train::run(&ws.params, &client).unwrap();
    assert!(trained.final_run_id.is_some());

    let report = evaluate::run(&ws.params, &client).unwrap();
    assert_eq!(report.holdout_rows, 1);

    let exp_id = client.experiment_id(EXPERIMENT_NAME).unwrap().unwrap();
    let runs = client.search_runs(&[exp_id], None, None).unwrap();
    let evaluated: Vec<_> = runs.iter().filter(|r| r.metric("final_accuracy").is_some()).collect();
    assert_eq!(evaluated.len(), 1);
    assert_eq!(evaluated[0].run_id, report.run_id);
    for key in FINAL_KEYS {
        let value = evaluated[0].metric(key).unwrap();
        assert!((0.0..=1.0).contains(&value), "{} = {}", key, value);
    }
    // training metrics are kept alongside the final ones
    assert!(evaluated[0].metric("Accuracy").is_some());
}

#[test]
fn test_tiny_dataset_logistic_regression_only() {
    for seed in [42, 1, 7] {
        let mut ws = Workspace::new(TINY, 0.67, seed, "");
        ws.params.models_to_compare = vec!["lr".to_string()];
        ws.prepare();

        let client = ws.client();
        let trained = train::run(&ws.params, &client).unwrap();
        assert_eq!(trained.final_model, "lr");

        let report = evaluate::run(&ws.params, &client).unwrap();
        assert_eq!(report.holdout_rows, 1);
        let run = client.get_run(&report.run_id).unwrap();
        for key in FINAL_KEYS {
            let value = run.metric(key).unwrap();
            assert!((0.0..=1.0).contains(&value), "seed {}: {} = {}", seed, key, value);
        }
    }
}

#[test]
fn test_evaluate_without_runs_fails() {
    let ws = Workspace::new(TINY, 0.67, 42, "");
    ws.prepare();

    let err = evaluate::run(&ws.params, &ws.client()).unwrap_err();
    assert!(matches!(err, PipelineError::NoRuns(_)));
}

#[test]
fn test_evaluate_is_idempotent() {
    let mut csv = String::from("tenure,contract,monthly_charges,churn\n");
    for i in 0..30 {
        let tenure = (i * 5) % 72;
        let contract = if i % 2 == 0 { "Month-to-month" } else { "One year" };
        let churn = if tenure < 30 { "Yes" } else { "No" };
        csv.push_str(&format!("{},{},{}.5,{}\n", tenure, contract, 20 + i * 3, churn));
    }
    let ws = Workspace::new(&csv, 0.7, 123, "fold: 3\n");
    ws.prepare();

    let client = ws.client();
    train::run(&ws.params, &client).unwrap();
    let exp_id = client.experiment_id(EXPERIMENT_NAME).unwrap().unwrap();
    let runs_before = client.search_runs(&[exp_id.clone()], None, None).unwrap().len();

    let first = evaluate::run(&ws.params, &client).unwrap();
    let second = evaluate::run(&ws.params, &client).unwrap();

    assert_eq!(first.run_id, second.run_id);
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(client.search_runs(&[exp_id], None, None).unwrap().len(), runs_before);

    let run = client.get_run(&first.run_id).unwrap();
    assert_eq!(run.metric("final_accuracy"), Some(first.metrics.accuracy));
    assert_eq!(run.metric("final_f1"), Some(first.metrics.f1));
}

#[test]
fn test_changed_split_is_detected() {
    let ws = Workspace::new(TINY, 0.67, 42, "");
    ws.prepare();
    let client = ws.client();
    train::run(&ws.params, &client).unwrap();

    let mut other = ws.params.clone();
    other.seed = 7;
    other.train_size = 0.34;
    let err = evaluate::run(&other, &client).unwrap_err();
    assert!(matches!(err, PipelineError::SplitMismatch { .. }));
}
