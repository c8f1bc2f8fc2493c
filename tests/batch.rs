mod common;

use common::{Calls, Scenario};
use drug_realign::batch::{self, BatchReport};
use drug_realign::pipeline::RunSpec;
use drug_realign::supervisor::Supervisor;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn failed_run_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    let harness = Scenario::default().build(dir.path());
    let specs = vec![
        RunSpec::direct("9XYZ"),
        RunSpec::direct("1C8K"),
    ];

    let report = batch::run_all(
        harness.pipeline.clone(),
        Supervisor::new(1, Duration::from_millis(1)),
        specs,
        1,
        BatchReport::default(),
    )
    .await;

    assert_eq!(report.succeeded, ["1C8K"]);
    assert_eq!(report.failed.len(), 1);
    let (label, reason) = &report.failed[0];
    assert_eq!(label, "9XYZ");
    assert!(reason.contains("no entry 9XYZ"));
    assert!(dir.path().join("result/csv/1C8K.csv").exists());
    assert!(!dir.path().join("result/csv/9XYZ.csv").exists());
    assert_eq!(Calls::get(&harness.calls.structure), 2);
}

#[tokio::test]
async fn earlier_failures_are_kept_in_the_report() {
    let dir = tempdir().unwrap();
    let harness = Scenario::default().build(dir.path());
    let mut report = BatchReport::default();
    report.record_failure("broken.yaml", "missing field `mode`");

    let report = batch::run_all(
        harness.pipeline.clone(),
        Supervisor::new(1, Duration::from_millis(1)),
        vec![RunSpec::direct("1C8K")],
        4,
        report,
    )
    .await;

    assert_eq!(report.succeeded, ["1C8K"]);
    assert_eq!(report.failed[0].0, "broken.yaml");
    assert!(report.elapsed > Duration::ZERO);
}
