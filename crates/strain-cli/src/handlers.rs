//! Command handlers.
//!
//! Each handler prints its report on stdout and returns whether everything
//! it ran passed. Harness faults come back as errors.

use crate::commands::{RunArgs, ScenariosArgs, SuiteArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, ProgressReporter};
use serde_json::json;
use strain::scenarios::{self, AcceptanceReport};
use strain::{
    memory_target, render_json, render_suite_json, render_suite_report, render_text_report,
    StressRunner, SuiteResults, TestHarness, TestSuite,
};

fn reporter_for(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

/// `strain run`
pub fn run_stress(config: &CliConfig, args: &RunArgs) -> CliResult<bool> {
    if args.fail_every == Some(0) {
        return Err(CliError::invalid_argument("--fail-every must be at least 1"));
    }
    let stress = args.to_config();
    let reporter = reporter_for(config);
    reporter.info(&format!(
        "running {} with {} threads x {} ops ({})",
        stress.name, stress.threads, stress.ops_per_thread, stress.assignment
    ));

    tracing::info!(
        test = %stress.name,
        roles = ?stress.assignment.roles_in_use(stress.threads),
        fault = ?stress.fault,
        "run command starting"
    );

    let result = StressRunner::new(stress.clone())
        .run(memory_target(stress.fault))
        .map_err(|err| {
            tracing::error!(
                test = %stress.name,
                error = %err,
                "run command aborted by harness error"
            );
            CliError::from(err)
        })?;

    let output = match config.format {
        OutputFormat::Json => render_json(&result),
        OutputFormat::Text => render_text_report(&result),
    };
    println!("{}", output);

    if !result.passed {
        reporter.failure(&format!("{}: {}", result.name, result.actual_value));
    }
    Ok(result.passed)
}

fn run_suite_with_progress(config: &CliConfig, suite: &TestSuite) -> SuiteResults {
    let mut reporter = reporter_for(config);
    reporter.start_progress(suite.test_count() as u64, &suite.name);
    let results = TestHarness::new().run_with_progress(
        suite,
        |test| memory_target(test.fault),
        |result| reporter.test_finished(result),
    );
    reporter.finish();
    reporter.summary(
        results.passed_count(),
        results.failed_count(),
        results.duration,
    );
    results
}

/// `strain suite <file>`
pub fn run_suite(config: &CliConfig, args: &SuiteArgs) -> CliResult<bool> {
    let mut suite = TestSuite::load(&args.file).map_err(|err| {
        tracing::error!(file = %args.file.display(), error = %err, "could not load suite");
        CliError::from(err)
    })?;
    if let Some(pattern) = &args.filter {
        suite.tests.retain(|t| t.name.contains(pattern.as_str()));
        if suite.tests.is_empty() {
            return Err(CliError::invalid_argument(format!(
                "no test in {} matches '{}'",
                args.file.display(),
                pattern
            )));
        }
    }
    for test in &suite.tests {
        if let Err(err) = test.validate() {
            tracing::error!(test = %test.name, error = %err, "suite test rejected");
            return Err(err.into());
        }
    }

    tracing::info!(
        suite = %suite.name,
        tests = suite.test_count(),
        filter = ?args.filter,
        "suite starting"
    );
    let results = run_suite_with_progress(config, &suite);
    tracing::info!(
        suite = %results.suite_name,
        passed = results.passed_count(),
        failed = results.failed_count(),
        duration_ms = results.duration.as_millis() as u64,
        "suite finished"
    );
    let output = match config.format {
        OutputFormat::Json => render_suite_json(&results),
        OutputFormat::Text => render_suite_report(&results),
    };
    println!("{}", output);
    Ok(results.all_passed())
}

fn render_acceptance_json(report: &AcceptanceReport) -> String {
    let scenarios: Vec<_> = report
        .scenarios
        .iter()
        .zip(&report.results.results)
        .map(|(scenario, result)| {
            json!({
                "label": scenario.label,
                "description": scenario.description,
                "expected": scenario.expected,
                "met": scenario.is_met_by(result),
                "result": result,
            })
        })
        .collect();
    let document = json!({
        "all_met": report.all_met(),
        "scenarios": scenarios,
    });
    serde_json::to_string_pretty(&document).unwrap_or_else(|_| "{}".to_string())
}

fn render_acceptance_text(report: &AcceptanceReport) -> String {
    let mut output = render_suite_report(&report.results);
    output.push_str("\nScenarios:\n");
    for (scenario, result) in report.scenarios.iter().zip(&report.results.results) {
        output.push_str(&format!(
            "  {} {} - expected {}, got {} [{}]\n",
            scenario.label,
            scenario.description,
            scenario.expected,
            result.verdict(),
            if scenario.is_met_by(result) {
                "met"
            } else {
                "NOT MET"
            }
        ));
    }
    output
}

/// `strain scenarios`
///
/// Succeeds when every scenario produced its expected verdict, including
/// the one that is designed to fail.
pub fn run_scenarios(config: &CliConfig, _args: &ScenariosArgs) -> CliResult<bool> {
    let mut reporter = reporter_for(config);
    let total = scenarios::acceptance_scenarios().len() as u64;
    reporter.start_progress(total, "acceptance");
    let report = scenarios::run_acceptance(|result| reporter.test_finished(result));
    reporter.finish();
    tracing::info!(
        scenarios = report.scenarios.len(),
        all_met = report.all_met(),
        "acceptance scenarios finished"
    );

    let output = match config.format {
        OutputFormat::Json => render_acceptance_json(&report),
        OutputFormat::Text => render_acceptance_text(&report),
    };
    println!("{}", output);
    Ok(report.all_met())
}
