//! Strain CLI: run concurrent stress tests from the command line
//!
//! ## Usage
//!
//! ```bash
//! strain run --role store --threads 8 --ops 50        # One ad hoc run
//! strain run --role store,retrieve,search,mixed -d 5  # Mixed roles, 5s ceiling
//! strain suite nightly.yaml --format json             # A suite file
//! strain scenarios                                    # Built-in acceptance scenarios
//! ```
//!
//! Exit codes: 0 when everything passed, 1 when a test failed, 2 on usage
//! or harness errors.

use clap::Parser;
use std::process::ExitCode;
use strain_cli::{handlers, init_logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity};

const EXIT_TEST_FAILED: u8 = 1;
const EXIT_HARNESS_ERROR: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_TEST_FAILED),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_HARNESS_ERROR)
        }
    }
}

fn run() -> CliResult<bool> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    console::set_colors_enabled_stderr(config.color.should_color());
    init_logging(config.verbosity, config.log_format)?;

    match &cli.command {
        Commands::Run(args) => handlers::run_stress(&config.with_format(args.format.into()), args),
        Commands::Suite(args) => handlers::run_suite(&config.with_format(args.format.into()), args),
        Commands::Scenarios(args) => {
            handlers::run_scenarios(&config.with_format(args.format.into()), args)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_format(cli.log_format.into())
}
