//! Built-in acceptance scenarios.
//!
//! Each scenario pairs a configuration with the verdict it must produce.
//! Scenario C is expected to fail: injecting a fault on every 10th store
//! lands exactly on the single-role tolerance.

use crate::aggregate::Verdict;
use crate::config::StressConfig;
use crate::harness::{SuiteResults, TestHarness, TestResult, TestSuite};
use crate::memory::{memory_target, FaultPlan};
use crate::role::WorkerRole;
use crate::target::Operation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration ceiling for the mixed-role scenario
pub const MIXED_SCENARIO_CEILING: Duration = Duration::from_secs(5);

/// A configuration and the verdict it is expected to produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Short label
    pub label: String,
    /// What the scenario checks
    pub description: String,
    /// Run configuration
    pub config: StressConfig,
    /// Verdict the run must produce
    pub expected: Verdict,
}

impl Scenario {
    /// Whether `result` matches the expected verdict
    #[must_use]
    pub fn is_met_by(&self, result: &TestResult) -> bool {
        result.verdict() == self.expected
    }
}

/// Scenario A: 8 store-only threads, 50 ops each, no contention
#[must_use]
pub fn store_only() -> Scenario {
    Scenario {
        label: "A".to_string(),
        description: "8 store threads x 50 ops, no failures".to_string(),
        config: StressConfig::single_role("scenario-a-store-only", WorkerRole::Store, 8, 50),
        expected: Verdict::Pass,
    }
}

/// Scenario B: one worker per role under a 5 second ceiling
#[must_use]
pub fn mixed_roles() -> Scenario {
    Scenario {
        label: "B".to_string(),
        description: "store, retrieve, search and mixed workers side by side, 5s ceiling"
            .to_string(),
        config: StressConfig::mixed_default("scenario-b-mixed-roles", WorkerRole::ALL, 4, 2_000)
            .with_duration(MIXED_SCENARIO_CEILING),
        expected: Verdict::Pass,
    }
}

/// Scenario C: every 10th store fails, sitting on the 10% boundary
#[must_use]
pub fn fault_boundary() -> Scenario {
    Scenario {
        label: "C".to_string(),
        description: "fault on every 10th store, 40/400 failures is not below 10%".to_string(),
        config: StressConfig::single_role("scenario-c-fault-boundary", WorkerRole::Store, 4, 100)
            .with_fault(FaultPlan::every_nth(Operation::Store, 10)),
        expected: Verdict::Fail,
    }
}

/// Scenarios A, B and C in order
#[must_use]
pub fn acceptance_scenarios() -> Vec<Scenario> {
    vec![store_only(), mixed_roles(), fault_boundary()]
}

/// Suite holding the configurations of `scenarios`
#[must_use]
pub fn acceptance_suite(scenarios: &[Scenario]) -> TestSuite {
    TestSuite {
        name: "acceptance".to_string(),
        tests: scenarios.iter().map(|s| s.config.clone()).collect(),
    }
}

/// Outcome of running the acceptance scenarios
#[derive(Debug, Clone)]
pub struct AcceptanceReport {
    /// Scenarios that were run
    pub scenarios: Vec<Scenario>,
    /// Their results, in the same order
    pub results: SuiteResults,
}

impl AcceptanceReport {
    /// Whether every scenario produced its expected verdict
    #[must_use]
    pub fn all_met(&self) -> bool {
        self.scenarios
            .iter()
            .zip(&self.results.results)
            .all(|(scenario, result)| scenario.is_met_by(result))
    }

    /// 0 when every scenario met its expectation
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_met())
    }
}

/// Run the acceptance scenarios against in-memory targets
pub fn run_acceptance(on_result: impl FnMut(&TestResult)) -> AcceptanceReport {
    let scenarios = acceptance_scenarios();
    let suite = acceptance_suite(&scenarios);
    let results = TestHarness::new().run_with_progress(
        &suite,
        |config| memory_target(config.fault),
        on_result,
    );
    AcceptanceReport { scenarios, results }
}
