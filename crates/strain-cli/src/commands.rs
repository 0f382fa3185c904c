//! CLI command definitions using clap

use crate::config::ColorChoice;
use crate::logging::LogFormat;
use crate::output::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use strain::{
    FaultPlan, Operation, PassCriteria, RoleAssignment, StressConfig, WorkerRole,
    DEFAULT_BARRIER_TIMEOUT_MS,
    DEFAULT_MIN_THROUGHPUT, DEFAULT_RETRIEVE_WARMUP_MS, DEFAULT_RETRIEVE_WINDOW,
};

/// Strain: synchronized multi-threaded stress tests for store/retrieve/search targets
#[derive(Parser, Debug)]
#[command(name = "strain")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format on stderr
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one stress test against the in-memory target
    Run(RunArgs),

    /// Run every test of a YAML or JSON suite file
    Suite(SuiteArgs),

    /// Run the built-in acceptance scenarios
    Scenarios(ScenariosArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test name used in the report
    #[arg(long, default_value = "adhoc")]
    pub name: String,

    /// Worker roles; more than one distributes them across workers
    #[arg(short, long = "role", value_delimiter = ',', default_value = "store")]
    pub roles: Vec<RoleArg>,

    /// Number of worker threads
    #[arg(short, long, default_value = "4")]
    pub threads: usize,

    /// Operations per worker thread
    #[arg(short, long, default_value = "100")]
    pub ops: u64,

    /// Duration ceiling in seconds
    #[arg(short, long, default_value = "30")]
    pub duration: u64,

    /// Minimum throughput (ops/sec); implies the mixed criterion
    #[arg(long)]
    pub min_throughput: Option<f64>,

    /// Inject a failure on every n-th call of --fail-op
    #[arg(long)]
    pub fail_every: Option<u64>,

    /// Operation that --fail-every applies to
    #[arg(long, default_value = "store")]
    pub fail_op: OperationArg,

    /// Delay before a retrieve worker's first read, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRIEVE_WARMUP_MS)]
    pub warmup_ms: u64,

    /// Partner iterations a retrieve worker cycles through
    #[arg(long, default_value_t = DEFAULT_RETRIEVE_WINDOW)]
    pub window: u64,

    /// Start barrier timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_BARRIER_TIMEOUT_MS)]
    pub barrier_timeout_ms: u64,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

impl RunArgs {
    /// Build the stress configuration these arguments describe.
    ///
    /// A single role is judged by the single-role criterion unless a
    /// throughput floor is given; several roles always use the mixed one.
    #[must_use]
    pub fn to_config(&self) -> StressConfig {
        let roles: Vec<WorkerRole> = self.roles.iter().map(|r| (*r).into()).collect();
        let assignment = RoleAssignment::from_roles(roles);
        let criteria = match (&assignment, self.min_throughput) {
            (RoleAssignment::Uniform { .. }, None) => PassCriteria::single_role(),
            (_, floor) => PassCriteria::mixed(floor.unwrap_or(DEFAULT_MIN_THROUGHPUT)),
        };

        let mut config = StressConfig {
            name: self.name.clone(),
            threads: self.threads,
            ops_per_thread: self.ops,
            assignment,
            criteria,
            ..StressConfig::default()
        };

        config = config
            .with_duration(Duration::from_secs(self.duration))
            .with_retrieve_warmup(Duration::from_millis(self.warmup_ms))
            .with_retrieve_window(self.window)
            .with_barrier_timeout(Duration::from_millis(self.barrier_timeout_ms));

        if let Some(every) = self.fail_every {
            config = config.with_fault(FaultPlan::every_nth(self.fail_op.into(), every));
        }
        config
    }
}

/// Arguments for the suite command
#[derive(Parser, Debug)]
pub struct SuiteArgs {
    /// Suite file (.yaml, .yml or .json)
    pub file: PathBuf,

    /// Only run tests whose name contains this pattern
    #[arg(long)]
    pub filter: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the scenarios command
#[derive(Parser, Debug)]
pub struct ScenariosArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Worker role argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleArg {
    /// Write uniquely keyed entries
    Store,
    /// Read a partner worker's entries
    Retrieve,
    /// Query a fixed vocabulary
    Search,
    /// Rotate through store, retrieve and search
    Mixed,
}

impl From<RoleArg> for WorkerRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Store => Self::Store,
            RoleArg::Retrieve => Self::Retrieve,
            RoleArg::Search => Self::Search,
            RoleArg::Mixed => Self::Mixed,
        }
    }
}

/// Target operation argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OperationArg {
    /// Store calls
    #[default]
    Store,
    /// Retrieve calls
    Retrieve,
    /// Search calls
    Search,
}

impl From<OperationArg> for Operation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Store => Self::Store,
            OperationArg::Retrieve => Self::Retrieve,
            OperationArg::Search => Self::Search,
        }
    }
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable report
    #[default]
    Text,
    /// JSON document
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
