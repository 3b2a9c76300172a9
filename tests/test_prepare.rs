//! Integration test: data preparation stage

use churn_pipeline::data::read_csv;
use churn_pipeline::stages::prepare;

const RAW: &str = "\
customer_id,tenure,contract,monthly_charges,churn
7590-VHVEG,1,Month-to-month,29.85,No
5575-GNVDE,34,One year,56.95,No
3668-QPYBK,2,Month-to-month,53.85,Yes
7795-CFOCW,45,One year,,No
9237-HQITU,2,Month-to-month,70.7,Yes
";

#[test]
fn test_prepare_keeps_shape() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw/telco_churn.csv");
    let processed = dir.path().join("processed/telco_churn_processed.csv");
    std::fs::create_dir_all(raw.parent().unwrap()).unwrap();
    std::fs::write(&raw, RAW).unwrap();

    let report = prepare::run(&raw, &processed).unwrap();
    assert_eq!(report.rows, 5);
    assert_eq!(report.columns, 5);
    assert_eq!(report.output, processed);

    let before = read_csv(&raw).unwrap();
    let after = read_csv(&processed).unwrap();
    assert_eq!(before.shape(), after.shape());
    assert_eq!(before.get_column_names(), after.get_column_names());
}

#[test]
fn test_prepare_overwrites_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw.csv");
    let processed = dir.path().join("processed.csv");
    std::fs::write(&raw, RAW).unwrap();
    std::fs::write(&processed, "stale\n1\n").unwrap();

    prepare::run(&raw, &processed).unwrap();
    let after = read_csv(&processed).unwrap();
    assert_eq!(after.height(), 5);
}

#[test]
fn test_prepare_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let result = prepare::run(&dir.path().join("nope.csv"), &dir.path().join("out.csv"));
    assert!(result.is_err());
}
