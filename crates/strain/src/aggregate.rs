//! Aggregate metrics and pass/fail criteria.
//!
//! Failure tolerances are whole percentages compared with integer
//! cross-multiplication, so `fail < total / 10` is decided exactly: 40
//! failures out of 400 operations is not below 10% and fails.

use crate::session::Counters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Failure tolerance for single-role tests
pub const SINGLE_ROLE_MAX_FAILURE_PERCENT: u32 = 10;
/// Failure tolerance for mixed-role tests
pub const MIXED_MAX_FAILURE_PERCENT: u32 = 20;
/// Default minimum throughput for mixed-role tests (successful ops/sec)
pub const DEFAULT_MIN_THROUGHPUT: f64 = 10.0;

/// How a run is judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassCriteria {
    /// Pass when `fail * 100 < total * max_failure_percent`
    SingleRole {
        /// Failure tolerance in percent
        max_failure_percent: u32,
    },
    /// Failure tolerance plus a minimum successful-ops throughput
    Mixed {
        /// Failure tolerance in percent
        max_failure_percent: u32,
        /// Throughput must be strictly greater than this (ops/sec)
        min_throughput: f64,
    },
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self::single_role()
    }
}

impl PassCriteria {
    /// Single-role criterion: under 10% failures
    #[must_use]
    pub const fn single_role() -> Self {
        Self::SingleRole {
            max_failure_percent: SINGLE_ROLE_MAX_FAILURE_PERCENT,
        }
    }

    /// Mixed-role criterion: under 20% failures and throughput above `min_throughput`
    #[must_use]
    pub const fn mixed(min_throughput: f64) -> Self {
        Self::Mixed {
            max_failure_percent: MIXED_MAX_FAILURE_PERCENT,
            min_throughput,
        }
    }

    /// Failure tolerance in percent
    #[must_use]
    pub const fn max_failure_percent(&self) -> u32 {
        match self {
            Self::SingleRole {
                max_failure_percent,
            }
            | Self::Mixed {
                max_failure_percent,
                ..
            } => *max_failure_percent,
        }
    }

    /// Human-readable criterion
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::SingleRole {
                max_failure_percent,
            } => format!("failures < {}% of operations", max_failure_percent),
            Self::Mixed {
                max_failure_percent,
                min_throughput,
            } => format!(
                "failures < {}% of operations and throughput > {:.1} ops/sec",
                max_failure_percent, min_throughput
            ),
        }
    }

    /// Apply the criterion. No retries: the verdict is final for this run.
    #[must_use]
    pub fn evaluate(&self, metrics: &Metrics) -> Evaluation {
        let failures_ok = failure_ratio_below(
            metrics.fail_ops,
            metrics.total_ops,
            self.max_failure_percent(),
        );
        let passed = match self {
            Self::SingleRole { .. } => failures_ok,
            Self::Mixed { min_throughput, .. } => {
                failures_ok && metrics.throughput > *min_throughput
            }
        };
        let actual = match self {
            Self::SingleRole { .. } => format!(
                "{}/{} failed ({:.2}%)",
                metrics.fail_ops,
                metrics.total_ops,
                metrics.failure_percent()
            ),
            Self::Mixed { .. } => format!(
                "{}/{} failed ({:.2}%), {:.1} ops/sec",
                metrics.fail_ops,
                metrics.total_ops,
                metrics.failure_percent(),
                metrics.throughput
            ),
        };
        Evaluation {
            verdict: if passed { Verdict::Pass } else { Verdict::Fail },
            criteria: self.describe(),
            actual,
        }
    }
}

/// `fail < total * percent / 100`, exactly
#[must_use]
pub fn failure_ratio_below(fail: u64, total: u64, percent: u32) -> bool {
    u128::from(fail) * 100 < u128::from(total) * u128::from(percent)
}

/// Aggregate numbers for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Operations attempted
    pub total_ops: u64,
    /// Successful operations, expected misses included
    pub success_ops: u64,
    /// Genuine failures
    pub fail_ops: u64,
    /// Retrieve misses tolerated as success
    pub expected_misses: u64,
    /// Wall-clock from before spawn to after join
    pub duration_ms: f64,
    /// Successful operations per second
    pub throughput: f64,
    /// `duration_ms / max(total_ops, 1)`
    pub avg_latency_ms: f64,
}

impl Metrics {
    /// Derive throughput and average latency from final counters.
    ///
    /// Both figures are wall-clock approximations over the whole run, not
    /// per-operation timings.
    #[must_use]
    pub fn from_counters(counters: &Counters, elapsed: Duration) -> Self {
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        let throughput = if duration_ms > 0.0 {
            counters.success_ops as f64 / (duration_ms / 1000.0)
        } else {
            0.0
        };
        Self {
            total_ops: counters.total_ops,
            success_ops: counters.success_ops,
            fail_ops: counters.fail_ops,
            expected_misses: counters.expected_misses,
            duration_ms,
            throughput,
            avg_latency_ms: duration_ms / counters.total_ops.max(1) as f64,
        }
    }

    /// Failure share in percent
    #[must_use]
    pub fn failure_percent(&self) -> f64 {
        if self.total_ops == 0 {
            return 0.0;
        }
        self.fail_ops as f64 / self.total_ops as f64 * 100.0
    }
}

/// Outcome of applying [`PassCriteria`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Criterion met
    Pass,
    /// Criterion missed
    Fail,
}

impl Verdict {
    /// Whether this is a pass
    #[must_use]
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Verdict plus the strings a report shows next to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Pass or fail
    pub verdict: Verdict,
    /// Criterion that was applied
    pub criteria: String,
    /// Observed values
    pub actual: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metrics(total: u64, fail: u64, throughput: f64) -> Metrics {
        Metrics {
            total_ops: total,
            success_ops: total - fail,
            fail_ops: fail,
            expected_misses: 0,
            duration_ms: 1000.0,
            throughput,
            avg_latency_ms: 1.0,
        }
    }

    #[test]
    fn test_single_role_just_below_threshold_passes() {
        let eval = PassCriteria::single_role().evaluate(&metrics(400, 39, 0.0));
        assert_eq!(eval.verdict, Verdict::Pass);
    }

    #[test]
    fn test_single_role_at_threshold_fails() {
        let eval = PassCriteria::single_role().evaluate(&metrics(400, 40, 0.0));
        assert_eq!(eval.verdict, Verdict::Fail);
        assert!(eval.actual.contains("40/400"));
    }

    #[test]
    fn test_single_role_uses_exact_ratio() {
        // 40 of 405 is 9.88%, below 10% even though 405 / 10 truncates to 40
        let eval = PassCriteria::single_role().evaluate(&metrics(405, 40, 0.0));
        assert_eq!(eval.verdict, Verdict::Pass);
    }

    #[test]
    fn test_zero_operations_fail() {
        let eval = PassCriteria::single_role().evaluate(&metrics(0, 0, 0.0));
        assert_eq!(eval.verdict, Verdict::Fail);
    }

    #[test]
    fn test_mixed_failure_boundary() {
        let criteria = PassCriteria::mixed(10.0);
        assert!(criteria.evaluate(&metrics(100, 19, 50.0)).verdict.is_pass());
        assert!(!criteria.evaluate(&metrics(100, 20, 50.0)).verdict.is_pass());
    }

    #[test]
    fn test_mixed_throughput_boundary() {
        let criteria = PassCriteria::mixed(10.0);
        assert!(criteria.evaluate(&metrics(100, 0, 10.01)).verdict.is_pass());
        assert!(!criteria.evaluate(&metrics(100, 0, 10.0)).verdict.is_pass());
    }

    #[test]
    fn test_describe() {
        assert!(PassCriteria::single_role().describe().contains("10%"));
        let mixed = PassCriteria::mixed(25.0).describe();
        assert!(mixed.contains("20%"));
        assert!(mixed.contains("25.0 ops/sec"));
    }

    #[test]
    fn test_metrics_from_counters() {
        let counters = Counters {
            total_ops: 400,
            success_ops: 360,
            fail_ops: 40,
            expected_misses: 5,
        };
        let m = Metrics::from_counters(&counters, Duration::from_secs(2));
        assert!((m.duration_ms - 2000.0).abs() < 1e-9);
        assert!((m.throughput - 180.0).abs() < 1e-9);
        assert!((m.avg_latency_ms - 5.0).abs() < 1e-9);
        assert!((m.failure_percent() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_zero_ops_latency_uses_one() {
        let m = Metrics::from_counters(&Counters::default(), Duration::from_millis(10));
        assert!((m.avg_latency_ms - 10.0).abs() < 1e-6);
        assert_eq!(m.failure_percent(), 0.0);
    }

    #[test]
    fn test_criteria_yaml() {
        let parsed: PassCriteria =
            serde_yaml_ng::from_str("kind: mixed\nmax_failure_percent: 20\nmin_throughput: 5.0")
                .unwrap();
        assert_eq!(parsed, PassCriteria::mixed(5.0));
    }

    proptest! {
        #[test]
        fn prop_single_role_matches_rational(total in 1u64..100_000, fail_permille in 0u64..1000) {
            let fail = total * fail_permille / 1000;
            let eval = PassCriteria::single_role().evaluate(&metrics(total, fail, 0.0));
            let expected = (fail as f64) < (total as f64) / 10.0;
            prop_assert_eq!(eval.verdict.is_pass(), expected);
        }
    }
}
