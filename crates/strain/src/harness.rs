//! Test harness for running stress suites.

use crate::aggregate::{Evaluation, Metrics, Verdict};
use crate::config::StressConfig;
use crate::memory::memory_target;
use crate::result::{StrainError, StrainResult};
use crate::runner::StressRunner;
use crate::session::{Diagnostic, DiagnosticKind, RoleStats, SessionSnapshot};
use crate::target::SystemUnderTest;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A suite of stress tests run one after another
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    /// Suite name
    pub name: String,
    /// Tests in this suite
    #[serde(default)]
    pub tests: Vec<StressConfig>,
}

impl TestSuite {
    /// Create a new test suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Add a test
    pub fn add_test(&mut self, test: StressConfig) {
        self.tests.push(test);
    }

    /// Add a test, builder style
    #[must_use]
    pub fn with_test(mut self, test: StressConfig) -> Self {
        self.tests.push(test);
        self
    }

    /// Get the number of tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Parse a YAML suite
    pub fn from_yaml_str(yaml: &str) -> StrainResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse a JSON suite
    pub fn from_json_str(json: &str) -> StrainResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a suite file; `.json` is JSON, anything else YAML
    pub fn load(path: impl AsRef<Path>) -> StrainResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let suite = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_yaml_str(&text)?,
        };
        if suite.tests.is_empty() {
            return Err(StrainError::suite_load(format!(
                "{} defines no tests",
                path.display()
            )));
        }
        Ok(suite)
    }
}

/// Result of one stress run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Run identifier
    pub run_id: Uuid,
    /// Worker threads used
    pub threads: usize,
    /// Operations attempted
    pub total_ops: u64,
    /// Successful operations, expected misses included
    pub success_ops: u64,
    /// Genuine failures
    pub fail_ops: u64,
    /// Retrieve misses tolerated as success
    pub expected_misses: u64,
    /// Wall-clock from before spawn to after join
    pub duration: Duration,
    /// Successful operations per second
    pub throughput: f64,
    /// Average wall-clock per operation in milliseconds
    pub avg_latency_ms: f64,
    /// Whether the pass criteria were met
    pub passed: bool,
    /// Criterion applied
    pub pass_criteria: String,
    /// Observed values
    pub actual_value: String,
    /// Whether the stop flag or the duration ceiling cut the run short
    pub stopped_early: bool,
    /// Per-role breakdown
    pub roles: Vec<RoleStats>,
    /// Diagnostics, in the order they were recorded
    pub diagnostics: Vec<Diagnostic>,
}

impl TestResult {
    /// Assemble from a finished session and its evaluation
    #[must_use]
    pub fn from_run(
        name: &str,
        threads: usize,
        snapshot: SessionSnapshot,
        metrics: &Metrics,
        evaluation: Evaluation,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            run_id: snapshot.run_id,
            threads,
            total_ops: metrics.total_ops,
            success_ops: metrics.success_ops,
            fail_ops: metrics.fail_ops,
            expected_misses: metrics.expected_misses,
            duration: elapsed,
            throughput: metrics.throughput,
            avg_latency_ms: metrics.avg_latency_ms,
            passed: evaluation.verdict.is_pass(),
            pass_criteria: evaluation.criteria,
            actual_value: evaluation.actual,
            stopped_early: snapshot.stopped,
            roles: snapshot.roles,
            diagnostics: snapshot.diagnostics,
        }
    }

    /// A run that never produced counts because the harness failed
    #[must_use]
    pub fn harness_failure(config: &StressConfig, error: &StrainError, elapsed: Duration) -> Self {
        Self {
            name: config.name.clone(),
            run_id: Uuid::nil(),
            threads: config.threads,
            total_ops: 0,
            success_ops: 0,
            fail_ops: 0,
            expected_misses: 0,
            duration: elapsed,
            throughput: 0.0,
            avg_latency_ms: 0.0,
            passed: false,
            pass_criteria: config.criteria.describe(),
            actual_value: "harness error".to_string(),
            stopped_early: false,
            roles: Vec::new(),
            diagnostics: vec![Diagnostic {
                kind: DiagnosticKind::Harness,
                operation: None,
                thread_index: 0,
                iteration: 0,
                detail: error.to_string(),
                elapsed: Duration::ZERO,
            }],
        }
    }

    /// Verdict as an enum
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        if self.passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Diagnostics of one kind
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

/// Results from running a test suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResults {
    /// Suite name
    pub suite_name: String,
    /// Individual test results
    pub results: Vec<TestResult>,
    /// Total duration
    pub duration: Duration,
}

impl SuiteResults {
    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Count passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Count failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Get total test count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    /// Process exit code: 0 when everything passed
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed())
    }
}

/// Runs every test of a suite, each against a fresh target
#[derive(Debug, Default)]
pub struct TestHarness;

impl TestHarness {
    /// Create a new test harness
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run a suite. `make_target` builds the target for each test.
    pub fn run<T, F>(&self, suite: &TestSuite, make_target: F) -> SuiteResults
    where
        T: SystemUnderTest,
        F: FnMut(&StressConfig) -> T,
    {
        self.run_with_progress(suite, make_target, |_| {})
    }

    /// Run a suite against in-memory targets, honoring each test's fault plan
    pub fn run_in_memory(&self, suite: &TestSuite) -> SuiteResults {
        self.run(suite, |config| memory_target(config.fault))
    }

    /// Run a suite, calling `on_result` after each test.
    ///
    /// A failing or broken test never stops the ones after it.
    pub fn run_with_progress<T, F, P>(
        &self,
        suite: &TestSuite,
        mut make_target: F,
        mut on_result: P,
    ) -> SuiteResults
    where
        T: SystemUnderTest,
        F: FnMut(&StressConfig) -> T,
        P: FnMut(&TestResult),
    {
        let start = Instant::now();
        let mut results = Vec::with_capacity(suite.tests.len());

        for config in &suite.tests {
            let test_start = Instant::now();
            let target = make_target(config);
            let result = match StressRunner::new(config.clone()).run(target) {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(test = %config.name, error = %err, "stress test aborted");
                    TestResult::harness_failure(config, &err, test_start.elapsed())
                }
            };
            on_result(&result);
            results.push(result);
        }

        SuiteResults {
            suite_name: suite.name.clone(),
            results,
            duration: start.elapsed(),
        }
    }
}
