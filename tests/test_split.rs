//! Integration test: holdout split shared by trainer and evaluator

use churn_pipeline::data::{Column, HoldoutSplit, Table};
use churn_pipeline::training::{ClassificationExperiment, SetupConfig};

fn churn_table(n: usize) -> Table {
    Table::new(vec![
        Column::numeric("tenure", (0..n).map(|i| Some((i % 72) as f64)).collect()),
        Column::categorical(
            "churn",
            (0..n).map(|i| Some(if i % 3 == 0 { "Yes" } else { "No" }.to_string())).collect(),
        ),
    ])
    .unwrap()
}

#[test]
fn test_trainer_and_evaluator_agree() {
    let table = churn_table(50);
    let experiment =
        ClassificationExperiment::setup(&table, SetupConfig::new("churn", 0.8, 123).with_fold(3))
            .unwrap();

    // what the evaluator computes independently
    let split = HoldoutSplit::new(table.n_rows(), 0.8, 123).unwrap();
    assert_eq!(experiment.holdout_split().holdout_indices, split.holdout_indices);
    assert_eq!(experiment.holdout_split().digest(), split.digest());
}

#[test]
fn test_split_sizes() {
    let split = HoldoutSplit::new(3, 0.67, 42).unwrap();
    assert_eq!(split.holdout_indices.len(), 1);
    assert_eq!(split.train_indices.len(), 2);

    let split = HoldoutSplit::new(1000, 0.7, 0).unwrap();
    assert_eq!(split.holdout_indices.len(), 300);
    assert!(split.holdout_indices.iter().all(|i| !split.train_indices.contains(i)));
}

#[test]
fn test_seed_changes_partition() {
    let a = HoldoutSplit::new(200, 0.75, 1).unwrap();
    let b = HoldoutSplit::new(200, 0.75, 2).unwrap();
    assert_eq!(a.holdout_indices.len(), b.holdout_indices.len());
    assert_ne!(a.holdout_indices, b.holdout_indices);
    assert_ne!(a.digest(), b.digest());
}

#[test]
fn test_invalid_split() {
    assert!(HoldoutSplit::new(10, 0.0, 1).is_err());
    assert!(HoldoutSplit::new(10, 1.0, 1).is_err());
    assert!(HoldoutSplit::new(1, 0.5, 1).is_err());
}
