//! Human-readable and JSON rendering of results.

use crate::harness::{SuiteResults, TestResult};

/// Diagnostics listed per test in text reports
pub const MAX_LISTED_DIAGNOSTICS: usize = 20;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

fn status(passed: bool) -> &'static str {
    if passed {
        "✅ PASS"
    } else {
        "❌ FAIL"
    }
}

/// Render one result as text
#[must_use]
pub fn render_text_report(result: &TestResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "STRESS TEST: {} [{}]\n",
        result.name,
        status(result.passed)
    ));
    output.push_str(RULE);
    output.push('\n');

    output.push_str(&format!("Run: {}\n", result.run_id));
    output.push_str(&format!("Threads: {}\n", result.threads));
    output.push_str(&format!("Duration: {:?}\n", result.duration));
    output.push_str(&format!(
        "Operations: {} total, {} ok, {} failed",
        result.total_ops, result.success_ops, result.fail_ops
    ));
    if result.expected_misses > 0 {
        output.push_str(&format!(" ({} expected misses)", result.expected_misses));
    }
    output.push('\n');
    output.push_str(&format!("Throughput: {:.1} ops/sec\n", result.throughput));
    output.push_str(&format!("Avg latency: {:.3} ms\n", result.avg_latency_ms));
    if result.stopped_early {
        output.push_str("Stopped early: duration ceiling reached\n");
    }
    output.push('\n');

    output.push_str("Pass Criteria:\n");
    output.push_str(&format!("  Expected: {}\n", result.pass_criteria));
    output.push_str(&format!("  Actual:   {}\n", result.actual_value));

    if !result.roles.is_empty() {
        output.push_str("\nRoles:\n");
        for stats in &result.roles {
            output.push_str(&format!(
                "  {:<8} workers={} total={} ok={} failed={} misses={}\n",
                stats.role.to_string(),
                stats.workers,
                stats.counters.total_ops,
                stats.counters.success_ops,
                stats.counters.fail_ops,
                stats.counters.expected_misses
            ));
        }
    }

    if !result.diagnostics.is_empty() {
        output.push_str(&format!("\nDiagnostics ({}):\n", result.diagnostics.len()));
        for diagnostic in result.diagnostics.iter().take(MAX_LISTED_DIAGNOSTICS) {
            output.push_str(&format!("  [{:?}] {}\n", diagnostic.elapsed, diagnostic));
        }
        let hidden = result.diagnostics.len().saturating_sub(MAX_LISTED_DIAGNOSTICS);
        if hidden > 0 {
            output.push_str(&format!("  ... and {} more\n", hidden));
        }
    }

    output
}

/// Render a suite as text: every test, then a summary line
#[must_use]
pub fn render_suite_report(results: &SuiteResults) -> String {
    let mut output = String::new();

    output.push_str(&format!("SUITE: {}\n", results.suite_name));
    output.push_str(RULE);
    output.push('\n');

    for result in &results.results {
        output.push_str(&render_text_report(result));
        output.push('\n');
    }

    output.push_str(&format!(
        "Summary: {} passed, {} failed, {} total in {:?} [{}]\n",
        results.passed_count(),
        results.failed_count(),
        results.total(),
        results.duration,
        status(results.all_passed())
    ));
    output
}

/// Render one result as JSON
#[must_use]
pub fn render_json(result: &TestResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
}

/// Render a suite as JSON
#[must_use]
pub fn render_suite_json(results: &SuiteResults) -> String {
    serde_json::to_string_pretty(results).unwrap_or_else(|_| "{}".to_string())
}
