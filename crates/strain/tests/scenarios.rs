//! Acceptance scenarios run end to end against the in-memory target.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};
use strain::scenarios::{self, MIXED_SCENARIO_CEILING};
use strain::{
    run_stress_test, DiagnosticKind, FaultInjector, MemoryStore, Operation, StressConfig,
    TestHarness, Verdict, WorkerRole,
};

#[test]
fn scenario_a_store_only_counts_every_operation() {
    let config = StressConfig::single_role("scenario-a", WorkerRole::Store, 8, 50);
    let store = Arc::new(MemoryStore::new());

    let result = run_stress_test(config, Arc::clone(&store)).unwrap();

    assert_eq!(result.total_ops, 400);
    assert_eq!(result.success_ops, 400);
    assert_eq!(result.fail_ops, 0);
    assert!(result.passed);
    assert!(result.diagnostics.is_empty());
    assert_eq!(store.len(), 400, "every key is unique");
}

#[test]
fn scenario_b_mixed_roles_respect_the_ceiling() {
    let config = StressConfig::mixed_default("scenario-b", WorkerRole::ALL, 4, 20_000)
        .with_duration(MIXED_SCENARIO_CEILING);

    let start = Instant::now();
    let result = run_stress_test(config, MemoryStore::new()).unwrap();
    let took = start.elapsed();

    // one iteration of slack plus thread start-up
    assert!(took < MIXED_SCENARIO_CEILING + Duration::from_secs(2), "took {:?}", took);
    assert_eq!(result.roles.len(), 4);
    for stats in &result.roles {
        assert!(stats.counters.total_ops > 0, "{} did no work", stats.role);
    }
    assert_eq!(result.total_ops, result.success_ops + result.fail_ops);
    assert_eq!(result.fail_ops, 0);
    assert!(result.passed);
}

#[test]
fn scenario_c_fault_boundary_is_deterministic() {
    for _ in 0..5 {
        let target = FaultInjector::new(MemoryStore::new(), Operation::Store, 10);
        let config = StressConfig::single_role("scenario-c", WorkerRole::Store, 4, 100);

        let result = run_stress_test(config, target).unwrap();

        assert_eq!(result.total_ops, 400);
        assert_eq!(result.fail_ops, 40);
        assert_eq!(result.success_ops, 360);
        assert!(!result.passed, "40/400 is not below 10%");
        assert_eq!(result.diagnostics.len(), 40);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::OperationFailed
                && d.operation == Some(Operation::Store)));
    }
}

#[test]
fn scenario_c_one_fault_fewer_passes() {
    // 39 failures out of 400 sits just below the boundary
    let target = FaultInjector::new(MemoryStore::new(), Operation::Store, 10);
    let config = StressConfig::single_role("scenario-c-below", WorkerRole::Store, 1, 399);

    let result = run_stress_test(config, target).unwrap();

    assert_eq!(result.fail_ops, 39);
    assert!(result.passed);
}

#[test]
fn built_in_scenarios_meet_expectations() {
    let mut names = Vec::new();
    let report = scenarios::run_acceptance(|r| names.push(r.name.clone()));

    assert_eq!(names.len(), 3);
    assert!(report.all_met());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.results.results[2].verdict(), Verdict::Fail);
    assert_eq!(report.results.exit_code(), 1);
}

#[test]
fn failing_test_does_not_abort_siblings() {
    let suite = strain::TestSuite::new("siblings")
        .with_test(
            StressConfig::single_role("faulty", WorkerRole::Store, 2, 20)
                .with_fault(strain::FaultPlan::every_nth(Operation::Store, 1)),
        )
        .with_test(StressConfig::single_role("healthy", WorkerRole::Store, 2, 20));

    let results = TestHarness::new().run_in_memory(&suite);

    assert_eq!(results.total(), 2);
    assert!(!results.results[0].passed);
    assert_eq!(results.results[0].fail_ops, 40);
    assert!(results.results[1].passed);
}
