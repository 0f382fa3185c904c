//! Stress run configuration.

use crate::aggregate::{PassCriteria, DEFAULT_MIN_THROUGHPUT};
use crate::memory::FaultPlan;
use crate::result::{StrainError, StrainResult};
use crate::role::{RoleAssignment, WorkerRole};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default duration ceiling
pub const DEFAULT_DURATION_MS: u64 = 30_000;
/// Default head start given to store workers before retrieve workers read
pub const DEFAULT_RETRIEVE_WARMUP_MS: u64 = 10;
/// Default window of partner iterations a retrieve worker cycles through
pub const DEFAULT_RETRIEVE_WINDOW: u64 = 100;
/// Default time a worker waits at the start barrier before giving up
pub const DEFAULT_BARRIER_TIMEOUT_MS: u64 = 30_000;

/// Configuration for one stress run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Test name used in reports
    pub name: String,
    /// Number of worker threads
    pub threads: usize,
    /// Iteration ceiling per worker
    pub ops_per_thread: u64,
    /// Wall-clock ceiling after the barrier releases, polled by workers
    pub duration_ms: u64,
    /// Role per worker
    pub assignment: RoleAssignment,
    /// How the run is judged
    pub criteria: PassCriteria,
    /// Sleep before a retrieve worker's first read
    pub retrieve_warmup_ms: u64,
    /// Retrieve workers read partner iterations modulo this window
    pub retrieve_window: u64,
    /// Time a worker waits at the barrier before the run is abandoned
    pub barrier_timeout_ms: u64,
    /// Failure injection for targets built from this config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultPlan>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            name: "stress".to_string(),
            threads: 4,
            ops_per_thread: 100,
            duration_ms: DEFAULT_DURATION_MS,
            assignment: RoleAssignment::default(),
            criteria: PassCriteria::single_role(),
            retrieve_warmup_ms: DEFAULT_RETRIEVE_WARMUP_MS,
            retrieve_window: DEFAULT_RETRIEVE_WINDOW,
            barrier_timeout_ms: DEFAULT_BARRIER_TIMEOUT_MS,
            fault: None,
        }
    }
}

impl StressConfig {
    /// Every worker runs `role`, judged by the single-role criterion
    pub fn single_role(
        name: impl Into<String>,
        role: WorkerRole,
        threads: usize,
        ops_per_thread: u64,
    ) -> Self {
        Self {
            name: name.into(),
            threads,
            ops_per_thread,
            assignment: RoleAssignment::uniform(role),
            criteria: PassCriteria::single_role(),
            ..Default::default()
        }
    }

    /// Workers cycle through `roles`, judged by the mixed criterion
    pub fn mixed(
        name: impl Into<String>,
        roles: impl Into<Vec<WorkerRole>>,
        threads: usize,
        ops_per_thread: u64,
        min_throughput: f64,
    ) -> Self {
        Self {
            name: name.into(),
            threads,
            ops_per_thread,
            assignment: RoleAssignment::distributed(roles),
            criteria: PassCriteria::mixed(min_throughput),
            ..Default::default()
        }
    }

    /// Mixed criterion with the default throughput floor
    pub fn mixed_default(
        name: impl Into<String>,
        roles: impl Into<Vec<WorkerRole>>,
        threads: usize,
        ops_per_thread: u64,
    ) -> Self {
        Self::mixed(name, roles, threads, ops_per_thread, DEFAULT_MIN_THROUGHPUT)
    }

    /// Set the duration ceiling
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Set the retrieve warm-up delay
    pub const fn with_retrieve_warmup(mut self, warmup: Duration) -> Self {
        self.retrieve_warmup_ms = warmup.as_millis() as u64;
        self
    }

    /// Set the retrieve window
    pub const fn with_retrieve_window(mut self, window: u64) -> Self {
        self.retrieve_window = window;
        self
    }

    /// Set the barrier timeout
    pub const fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.barrier_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replace the pass criteria
    pub fn with_criteria(mut self, criteria: PassCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Attach a failure injection plan
    pub const fn with_fault(mut self, fault: FaultPlan) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Duration ceiling
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Retrieve warm-up delay
    pub const fn retrieve_warmup(&self) -> Duration {
        Duration::from_millis(self.retrieve_warmup_ms)
    }

    /// Barrier timeout
    pub const fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> StrainResult<()> {
        if self.threads == 0 {
            return Err(StrainError::invalid_config(format!(
                "{}: threads must be at least 1",
                self.name
            )));
        }
        if self.ops_per_thread == 0 {
            return Err(StrainError::invalid_config(format!(
                "{}: ops_per_thread must be at least 1",
                self.name
            )));
        }
        if let RoleAssignment::Distributed { roles } = &self.assignment {
            if roles.is_empty() {
                return Err(StrainError::invalid_config(format!(
                    "{}: distributed assignment needs at least one role",
                    self.name
                )));
            }
        }
        if self.retrieve_window == 0 {
            return Err(StrainError::invalid_config(format!(
                "{}: retrieve_window must be at least 1",
                self.name
            )));
        }
        if self.barrier_timeout_ms == 0 {
            return Err(StrainError::invalid_config(format!(
                "{}: barrier_timeout_ms must be at least 1",
                self.name
            )));
        }
        if let Some(plan) = &self.fault {
            if plan.every == 0 {
                return Err(StrainError::invalid_config(format!(
                    "{}: fault.every must be at least 1 (remove the fault to disable it)",
                    self.name
                )));
            }
        }
        let percent = self.criteria.max_failure_percent();
        if percent == 0 || percent > 100 {
            return Err(StrainError::invalid_config(format!(
                "{}: max_failure_percent must be within 1..=100, got {}",
                self.name, percent
            )));
        }
        if let PassCriteria::Mixed { min_throughput, .. } = self.criteria {
            if !min_throughput.is_finite() || min_throughput < 0.0 {
                return Err(StrainError::invalid_config(format!(
                    "{}: min_throughput must be a non-negative number",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
