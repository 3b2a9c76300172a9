use churn_pipeline::data::{Column, Table};
use churn_pipeline::training::{ClassificationExperiment, Metric, ModelKind, SetupConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];

fn create_churn_table(n_rows: usize) -> Table {
    let mut rng = rand::thread_rng();

    let mut tenure = Vec::with_capacity(n_rows);
    let mut monthly = Vec::with_capacity(n_rows);
    let mut contract = Vec::with_capacity(n_rows);
    let mut churn = Vec::with_capacity(n_rows);
    for _ in 0..n_rows {
        let t: f64 = rng.gen_range(0.0..72.0);
        let m: f64 = rng.gen_range(20.0..120.0);
        let c = CONTRACTS[rng.gen_range(0..CONTRACTS.len())];
        let risk = m / 120.0 - t / 72.0 + if c == "Month-to-month" { 0.3 } else { 0.0 };
        tenure.push(Some(t));
        monthly.push(Some(m));
        contract.push(Some(c.to_string()));
        let label = if risk + rng.gen::<f64>() * 0.2 > 0.3 { "Yes" } else { "No" };
        churn.push(Some(label.to_string()));
    }

    Table::new(vec![
        Column::numeric("tenure", tenure),
        Column::numeric("monthly_charges", monthly),
        Column::categorical("contract", contract),
        Column::categorical("churn", churn),
    ])
    .unwrap()
}

fn bench_compare_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_models");
    group.sample_size(10);

    let kinds = [
        ModelKind::LogisticRegression,
        ModelKind::NaiveBayes,
        ModelKind::DecisionTree,
        ModelKind::Dummy,
    ];

    for n_rows in [200, 1000].iter() {
        let table = create_churn_table(*n_rows);
        let experiment =
            ClassificationExperiment::setup(&table, SetupConfig::new("churn", 0.8, 42).with_fold(5))
                .unwrap();

        group.bench_with_input(BenchmarkId::new("cv", n_rows), &experiment, |b, exp| {
            b.iter(|| exp.compare_models(black_box(&kinds), Metric::Accuracy, 1).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let table = create_churn_table(2000);
    let experiment =
        ClassificationExperiment::setup(&table, SetupConfig::new("churn", 0.8, 42).with_fold(3))
            .unwrap();
    let best = experiment
        .compare_models(&[ModelKind::RandomForest], Metric::Accuracy, 1)
        .unwrap()
        .remove(0);
    let model = experiment.finalize_model(&best).unwrap().model;

    for n_rows in [100, 1000].iter() {
        let (features, _) = create_churn_table(*n_rows).split_target("churn").unwrap();

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &features, |b, features| {
            b.iter(|| model.predict_table(black_box(features)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compare_models, bench_prediction);
criterion_main!(benches);
