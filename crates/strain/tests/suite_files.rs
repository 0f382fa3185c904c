//! Loading suites from YAML and JSON files.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use strain::{FaultPlan, Operation, PassCriteria, StrainError, TestHarness, TestSuite, WorkerRole};
use tempfile::TempDir;

const SUITE_YAML: &str = r"
name: file-suite
tests:
  - name: writers
    threads: 4
    ops_per_thread: 25
    assignment:
      policy: uniform
      role: store
  - name: readers-and-writers
    threads: 4
    ops_per_thread: 25
    retrieve_warmup_ms: 0
    assignment:
      policy: distributed
      roles: [store, retrieve]
    criteria:
      kind: mixed
      max_failure_percent: 20
      min_throughput: 1.0
  - name: boundary
    threads: 4
    ops_per_thread: 100
    fault:
      operation: store
      every: 10
";

#[test]
fn yaml_suite_loads_and_runs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("suite.yaml");
    fs::write(&path, SUITE_YAML).unwrap();

    let suite = TestSuite::load(&path).unwrap();
    assert_eq!(suite.name, "file-suite");
    assert_eq!(suite.test_count(), 3);
    assert_eq!(suite.tests[1].criteria, PassCriteria::mixed(1.0));
    assert_eq!(
        suite.tests[2].fault,
        Some(FaultPlan::every_nth(Operation::Store, 10))
    );

    let results = TestHarness::new().run_in_memory(&suite);
    assert!(results.results[0].passed);
    assert!(results.results[1].passed);
    assert!(!results.results[2].passed);
    assert_eq!(results.results[2].fail_ops, 40);
    assert_eq!(results.exit_code(), 1);
}

#[test]
fn json_suite_is_chosen_by_extension() {
    let suite = TestSuite::new("json-suite").with_test(strain::StressConfig::single_role(
        "searchers",
        WorkerRole::Search,
        2,
        10,
    ));
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("suite.json");
    fs::write(&path, serde_json::to_string_pretty(&suite).unwrap()).unwrap();

    let loaded = TestSuite::load(&path).unwrap();
    assert_eq!(loaded, suite);
}

#[test]
fn empty_suite_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.yml");
    fs::write(&path, "name: nothing\ntests: []\n").unwrap();

    let err = TestSuite::load(&path).unwrap_err();
    assert!(matches!(err, StrainError::SuiteLoad { .. }));
    assert!(err.to_string().contains("no tests"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = TestSuite::load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, StrainError::Io(_)));
}

#[test]
fn malformed_json_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{\"name\": ").unwrap();

    let err = TestSuite::load(&path).unwrap_err();
    assert!(matches!(err, StrainError::Json(_)));
}
