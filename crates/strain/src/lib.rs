//! Strain: synchronized multi-threaded stress harness
//!
//! Strain drives a stateful store/retrieve/search target from N worker
//! threads that start together behind a barrier, counts every operation
//! without loss, and judges the run against explicit pass criteria.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     STRAIN Run Lifecycle                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Stress     │    │ Session    │    │ Workers    │            │
//! │   │ Config     │───►│ + Barrier  │───►│ (scoped    │            │
//! │   │            │    │            │    │  threads)  │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │ join              │
//! │   ┌────────────┐    ┌────────────┐    ┌─────▼──────┐            │
//! │   │ Reporter   │◄───│ TestResult │◄───│ Pass       │            │
//! │   │ text/json  │    │            │    │ Criteria   │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use strain::{run_stress_test, MemoryStore, StressConfig, WorkerRole};
//!
//! let config = StressConfig::single_role("store-only", WorkerRole::Store, 4, 25);
//! let result = run_stress_test(config, MemoryStore::new()).unwrap();
//! assert_eq!(result.total_ops, 100);
//! assert!(result.passed);
//! ```

#![warn(missing_docs)]

mod aggregate;
mod barrier;
mod config;
mod harness;
mod memory;
mod reporter;
mod result;
mod role;
mod runner;
pub mod scenarios;
mod session;
mod target;
mod worker;

pub use aggregate::{
    failure_ratio_below, Evaluation, Metrics, PassCriteria, Verdict, DEFAULT_MIN_THROUGHPUT,
    MIXED_MAX_FAILURE_PERCENT, SINGLE_ROLE_MAX_FAILURE_PERCENT,
};
pub use barrier::{Arrival, StartBarrier};
pub use config::{
    StressConfig, DEFAULT_BARRIER_TIMEOUT_MS, DEFAULT_DURATION_MS, DEFAULT_RETRIEVE_WARMUP_MS,
    DEFAULT_RETRIEVE_WINDOW,
};
pub use harness::{SuiteResults, TestHarness, TestResult, TestSuite};
pub use memory::{memory_target, FaultInjector, FaultPlan, MemoryStore, DEFAULT_SEARCH_LIMIT};
pub use reporter::{
    render_json, render_suite_json, render_suite_report, render_text_report,
    MAX_LISTED_DIAGNOSTICS,
};
pub use result::{StrainError, StrainResult};
pub use role::{RoleAssignment, WorkerRole};
pub use runner::{run_stress_test, StressRunner};
pub use session::{
    Counters, Diagnostic, DiagnosticKind, RoleStats, RunPhase, Session, SessionSnapshot,
};
pub use target::{Identity, Operation, Params, SystemUnderTest, TargetError};
pub use worker::{
    classify, operation_key, partner_of, Outcome, WorkerContext, WorkerReport, SEARCH_TERMS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        run_stress_test, FaultInjector, MemoryStore, Operation, PassCriteria, RoleAssignment,
        StrainError, StrainResult, StressConfig, StressRunner, SystemUnderTest, TargetError,
        TestHarness, TestResult, TestSuite, WorkerRole,
    };
}
