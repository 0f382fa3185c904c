//! Strain CLI Library
//!
//! Command-line interface for the Strain stress harness.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, FormatArg, LogFormatArg, OperationArg, RoleArg, RunArgs,
    ScenariosArgs, SuiteArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::{default_directives, init_logging, LogFormat};
pub use output::{OutputFormat, ProgressReporter};
