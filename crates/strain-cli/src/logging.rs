//! Log subscriber setup.
//!
//! Logs go to stderr so reports on stdout stay machine-readable. `RUST_LOG`
//! takes precedence over the verbosity flags.

use crate::config::Verbosity;
use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Filter directives used when `RUST_LOG` is unset
#[must_use]
pub fn default_directives(verbosity: Verbosity) -> String {
    let level = verbosity.log_level();
    format!("strain={},strain_cli={}", level, level)
}

/// Install the global subscriber
pub fn init_logging(verbosity: Verbosity, format: LogFormat) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };
    installed.map_err(|e| CliError::config(format!("failed to install log subscriber: {}", e)))
}
