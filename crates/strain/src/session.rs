//! Shared state for one stress run.
//!
//! A [`Session`] is created per run, borrowed by every worker for the
//! duration of the run, and dropped (taking the target with it) right after
//! the runner has joined all workers. Counters only ever grow, and all of
//! them use `SeqCst` so that reads after the join are exact.

use crate::barrier::{Arrival, StartBarrier};
use crate::result::StrainResult;
use crate::role::WorkerRole;
use crate::target::{Operation, SystemUnderTest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Lifecycle of a run. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RunPhase {
    /// Session allocated, no threads yet
    Created = 0,
    /// Every worker thread exists
    AllThreadsSpawned = 1,
    /// Last worker reached the barrier and stamped the start instant
    BarrierReleased = 2,
    /// At least one worker is in its measured loop
    Running = 3,
    /// Runner joined every worker
    AllThreadsJoined = 4,
    /// Verdict computed
    Aggregated = 5,
}

impl RunPhase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::AllThreadsSpawned,
            2 => Self::BarrierReleased,
            3 => Self::Running,
            4 => Self::AllThreadsJoined,
            _ => Self::Aggregated,
        }
    }

    /// Whether no further transitions happen
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Aggregated)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::AllThreadsSpawned => "all-threads-spawned",
            Self::BarrierReleased => "barrier-released",
            Self::Running => "running",
            Self::AllThreadsJoined => "all-threads-joined",
            Self::Aggregated => "aggregated",
        };
        f.write_str(name)
    }
}

/// What went wrong in a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Request payload could not be built; the call was never made
    ParameterConstruction,
    /// The target returned an error that is not an expected miss
    OperationFailed,
    /// The target panicked inside `execute`
    TargetPanicked,
    /// The harness itself failed and the run produced no counts
    Harness,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParameterConstruction => write!(f, "Parameter Construction"),
            Self::OperationFailed => write!(f, "Operation Failed"),
            Self::TargetPanicked => write!(f, "Target Panicked"),
            Self::Harness => write!(f, "Harness"),
        }
    }
}

/// One recorded genuine failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Failure class
    pub kind: DiagnosticKind,
    /// Operation that was attempted, when there was one
    pub operation: Option<Operation>,
    /// Worker index
    pub thread_index: usize,
    /// Iteration within the worker's loop
    pub iteration: u64,
    /// Free-form detail
    pub detail: String,
    /// Time since the barrier released
    pub elapsed: Duration,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] worker {} iteration {}",
            self.kind, self.thread_index, self.iteration
        )?;
        if let Some(op) = self.operation {
            write!(f, " ({})", op)?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// Point-in-time copy of the operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Operations attempted
    pub total_ops: u64,
    /// Successful operations, expected misses included
    pub success_ops: u64,
    /// Genuine failures
    pub fail_ops: u64,
    /// Retrieve misses tolerated as success
    pub expected_misses: u64,
}

#[derive(Debug, Default)]
struct AtomicCounters {
    total: AtomicU64,
    success: AtomicU64,
    fail: AtomicU64,
    misses: AtomicU64,
}

impl AtomicCounters {
    fn success(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.success.fetch_add(1, Ordering::SeqCst);
    }

    fn miss(&self) {
        self.success();
        self.misses.fetch_add(1, Ordering::SeqCst);
    }

    fn fail(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.fail.fetch_add(1, Ordering::SeqCst);
    }

    fn load(&self) -> Counters {
        Counters {
            total_ops: self.total.load(Ordering::SeqCst),
            success_ops: self.success.load(Ordering::SeqCst),
            fail_ops: self.fail.load(Ordering::SeqCst),
            expected_misses: self.misses.load(Ordering::SeqCst),
        }
    }
}

/// Per-role counters as reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStats {
    /// Role
    pub role: WorkerRole,
    /// Workers that ran this role
    pub workers: usize,
    /// Counters for those workers
    pub counters: Counters,
}

/// Everything the runner reads once the workers are gone
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Run identifier
    pub run_id: Uuid,
    /// Aggregate counters
    pub counters: Counters,
    /// Counters per role, only for roles that had workers
    pub roles: Vec<RoleStats>,
    /// Copy of the diagnostic log
    pub diagnostics: Vec<Diagnostic>,
    /// Workers that reported completion
    pub completed: usize,
    /// Whether the stop flag was raised
    pub stopped: bool,
    /// Start offset from session creation, if the barrier released
    pub start_offset: Option<Duration>,
}

/// Shared test state for one run
#[derive(Debug)]
pub struct Session<T> {
    run_id: Uuid,
    target: T,
    threads: usize,
    created_at: Instant,
    barrier: StartBarrier,
    counters: AtomicCounters,
    role_counters: [AtomicCounters; 4],
    role_workers: [AtomicUsize; 4],
    errors: Mutex<Vec<Diagnostic>>,
    completed: AtomicUsize,
    stop: AtomicBool,
    phase: AtomicU8,
}

impl<T: SystemUnderTest> Session<T> {
    /// Create a session for `threads` workers. The session owns `target`
    /// until it is dropped.
    #[must_use]
    pub fn new(target: T, threads: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            target,
            threads,
            created_at: Instant::now(),
            barrier: StartBarrier::new(threads),
            counters: AtomicCounters::default(),
            role_counters: Default::default(),
            role_workers: Default::default(),
            errors: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            phase: AtomicU8::new(RunPhase::Created as u8),
        }
    }

    /// Run identifier
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Target under test
    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    /// Number of workers in this run
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Start barrier
    #[must_use]
    pub const fn barrier(&self) -> &StartBarrier {
        &self.barrier
    }

    /// Register a worker's role before it starts
    pub fn enlist(&self, role: WorkerRole) {
        self.role_workers[role.index()].fetch_add(1, Ordering::SeqCst);
    }

    /// Wait at the start barrier
    pub fn arrive(&self, timeout: Duration) -> StrainResult<Arrival> {
        let arrival = self.barrier.arrive_and_wait(timeout)?;
        if arrival.released_by_me {
            self.advance(RunPhase::BarrierReleased);
        }
        Ok(arrival)
    }

    /// Instant recorded when the barrier released
    #[must_use]
    pub fn started_at(&self) -> Option<Instant> {
        self.barrier.started_at()
    }

    /// Barrier release time measured from session creation
    #[must_use]
    pub fn start_offset(&self) -> Option<Duration> {
        self.started_at()
            .map(|at| at.saturating_duration_since(self.created_at))
    }

    /// Count a successful operation
    pub fn record_success(&self, role: WorkerRole) {
        self.counters.success();
        self.role_counters[role.index()].success();
    }

    /// Count a tolerated miss. Never logged as a diagnostic.
    pub fn record_expected_miss(&self, role: WorkerRole) {
        self.counters.miss();
        self.role_counters[role.index()].miss();
    }

    /// Count a genuine failure and append its diagnostic.
    ///
    /// The counters are bumped before the log lock is taken, and a poisoned
    /// lock is recovered, so a failure is always counted and always logged.
    pub fn record_failure(&self, role: WorkerRole, diagnostic: Diagnostic) {
        self.counters.fail();
        self.role_counters[role.index()].fail();
        tracing::debug!(
            run_id = %self.run_id,
            kind = ?diagnostic.kind,
            thread = diagnostic.thread_index,
            iteration = diagnostic.iteration,
            detail = %diagnostic.detail,
            "operation failed"
        );
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    /// Current counters
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.counters.load()
    }

    /// Number of diagnostics recorded so far
    #[must_use]
    pub fn diagnostic_count(&self) -> usize {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copy of the diagnostic log
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Raise the stop flag. Returns `true` only for the call that raised it.
    pub fn request_stop(&self) -> bool {
        self.stop
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Whether workers should leave their loops
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// A worker left its loop. Returns how many have done so.
    pub fn mark_completed(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Workers that have left their loops
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Move the run forward to `phase`. Earlier phases are ignored, so racing
    /// observers cannot move the run backward. Returns the phase now in effect.
    pub fn advance(&self, phase: RunPhase) -> RunPhase {
        let previous = RunPhase::from_u8(self.phase.fetch_max(phase as u8, Ordering::SeqCst));
        if previous < phase {
            tracing::debug!(run_id = %self.run_id, from = %previous, to = %phase, "run phase");
            phase
        } else {
            previous
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Copy out everything the report needs
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let roles = WorkerRole::ALL
            .into_iter()
            .filter_map(|role| {
                let workers = self.role_workers[role.index()].load(Ordering::SeqCst);
                (workers > 0).then(|| RoleStats {
                    role,
                    workers,
                    counters: self.role_counters[role.index()].load(),
                })
            })
            .collect();
        SessionSnapshot {
            run_id: self.run_id,
            counters: self.counters(),
            roles,
            diagnostics: self.diagnostics(),
            completed: self.completed(),
            stopped: self.should_stop(),
            start_offset: self.start_offset(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use std::thread;

    fn diagnostic(thread_index: usize, iteration: u64) -> Diagnostic {
        Diagnostic {
            kind: DiagnosticKind::OperationFailed,
            operation: Some(Operation::Store),
            thread_index,
            iteration,
            detail: "boom".to_string(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_counters_add_up() {
        let session = Session::new(MemoryStore::new(), 1);
        session.record_success(WorkerRole::Store);
        session.record_expected_miss(WorkerRole::Retrieve);
        session.record_failure(WorkerRole::Store, diagnostic(0, 2));

        let counters = session.counters();
        assert_eq!(counters.total_ops, 3);
        assert_eq!(counters.success_ops, 2);
        assert_eq!(counters.fail_ops, 1);
        assert_eq!(counters.expected_misses, 1);
        assert_eq!(session.diagnostic_count(), 1);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let session = Session::new(MemoryStore::new(), 8);
        thread::scope(|s| {
            for t in 0..8 {
                let session = &session;
                s.spawn(move || {
                    for i in 0..1000 {
                        if i % 10 == 0 {
                            session.record_failure(WorkerRole::Mixed, diagnostic(t, i));
                        } else {
                            session.record_success(WorkerRole::Mixed);
                        }
                    }
                });
            }
        });
        let counters = session.counters();
        assert_eq!(counters.total_ops, 8000);
        assert_eq!(counters.fail_ops, 800);
        assert_eq!(counters.total_ops, counters.success_ops + counters.fail_ops);
        assert_eq!(session.diagnostic_count(), 800);
    }

    #[test]
    fn test_stop_is_raised_once() {
        let session = Session::new(MemoryStore::new(), 1);
        assert!(!session.should_stop());
        assert!(session.request_stop());
        assert!(!session.request_stop());
        assert!(session.should_stop());
    }

    #[test]
    fn test_phase_never_moves_backward() {
        let session = Session::new(MemoryStore::new(), 1);
        assert_eq!(session.phase(), RunPhase::Created);
        assert_eq!(session.advance(RunPhase::BarrierReleased), RunPhase::BarrierReleased);
        // a late spawn notification does not rewind the run
        assert_eq!(session.advance(RunPhase::AllThreadsSpawned), RunPhase::BarrierReleased);
        session.advance(RunPhase::AllThreadsJoined);
        assert_eq!(session.advance(RunPhase::Running), RunPhase::AllThreadsJoined);
        assert!(!session.phase().is_terminal());
        session.advance(RunPhase::Aggregated);
        assert!(session.phase().is_terminal());
    }

    #[test]
    fn test_arrive_marks_barrier_released() {
        let session = Session::new(MemoryStore::new(), 1);
        assert!(session.started_at().is_none());
        let arrival = session.arrive(Duration::from_secs(1)).unwrap();
        assert!(arrival.released_by_me);
        assert_eq!(session.phase(), RunPhase::BarrierReleased);
        assert_eq!(session.started_at(), Some(arrival.started_at));
        assert!(session.start_offset().is_some());
    }

    #[test]
    fn test_snapshot_lists_enlisted_roles_only() {
        let session = Session::new(MemoryStore::new(), 2);
        session.enlist(WorkerRole::Store);
        session.enlist(WorkerRole::Search);
        session.record_success(WorkerRole::Search);
        let snapshot = session.snapshot();
        let roles: Vec<WorkerRole> = snapshot.roles.iter().map(|r| r.role).collect();
        assert_eq!(roles, vec![WorkerRole::Store, WorkerRole::Search]);
        assert_eq!(snapshot.roles[1].counters.success_ops, 1);
        assert_eq!(snapshot.run_id, session.run_id());
    }

    #[test]
    fn test_diagnostics_copy_is_independent() {
        let session = Session::new(MemoryStore::new(), 1);
        session.record_failure(WorkerRole::Store, diagnostic(0, 0));
        let copy = session.diagnostics();
        session.record_failure(WorkerRole::Store, diagnostic(0, 1));
        assert_eq!(copy.len(), 1);
        assert_eq!(session.diagnostic_count(), 2);
    }

    #[test]
    fn test_diagnostic_display() {
        let text = diagnostic(3, 7).to_string();
        assert!(text.contains("Operation Failed"));
        assert!(text.contains("worker 3"));
        assert!(text.contains("iteration 7"));
        assert!(text.contains("(store)"));
    }
}
