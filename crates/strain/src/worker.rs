//! Worker loops.
//!
//! Each worker waits at the session barrier, then runs up to
//! `ops_per_thread` iterations. Every iteration issues exactly one call to
//! the target, classifies the outcome, and updates the session counters. An
//! error never ends the loop; only the stop flag or the duration ceiling do,
//! and both are polled once per iteration.

use crate::config::StressConfig;
use crate::result::{panic_message, StrainResult};
use crate::role::WorkerRole;
use crate::session::{Diagnostic, DiagnosticKind, RunPhase, Session};
use crate::target::{Identity, Operation, Params, SystemUnderTest, TargetError};
use serde::Serialize;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Terms a search worker cycles through
pub const SEARCH_TERMS: [&str; 5] = ["strain", "worker", "value", "thread", "iteration"];

/// Key written by worker `thread_index` on `iteration`.
///
/// Any thread can compute another thread's keys without coordination.
#[must_use]
pub fn operation_key(thread_index: usize, iteration: u64) -> String {
    format!("strain:t{}:i{}", thread_index, iteration)
}

/// Worker whose keys a retrieve from `thread_index` reads
#[must_use]
pub const fn partner_of(thread_index: usize, threads: usize) -> usize {
    if threads == 0 {
        0
    } else {
        (thread_index + 1) % threads
    }
}

/// Immutable per-thread record
#[derive(Debug)]
pub struct WorkerContext<'s, T> {
    /// Worker index, `0..threads`
    pub index: usize,
    /// Role this worker plays
    pub role: WorkerRole,
    /// Shared run state
    pub session: &'s Session<T>,
    /// Run configuration
    pub config: &'s StressConfig,
}

// Manual impls: `T` itself need not be Clone for the borrowed context to be.
impl<T> Clone for WorkerContext<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WorkerContext<'_, T> {}

/// What a worker reports when it leaves its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    /// Worker index
    pub index: usize,
    /// Role played
    pub role: WorkerRole,
    /// Iterations actually executed
    pub iterations: u64,
    /// Whether the loop ended before `ops_per_thread`
    pub stopped_early: bool,
}

/// How one call turned out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Call succeeded
    Success,
    /// Retrieve found nothing; tolerated because cross-thread order is not guaranteed
    ExpectedMiss,
    /// Anything else
    Failure {
        /// Failure class
        kind: DiagnosticKind,
        /// Detail for the diagnostic
        detail: String,
    },
}

/// Classify a target response for a call of `operation`.
///
/// `NotFound` on a retrieve is an expected miss in every role that
/// retrieves, the mixed role included.
#[must_use]
pub fn classify(operation: Operation, response: &Result<Value, TargetError>) -> Outcome {
    match response {
        Ok(_) => Outcome::Success,
        Err(err) if operation == Operation::Retrieve && err.is_not_found() => Outcome::ExpectedMiss,
        Err(err) => Outcome::Failure {
            kind: DiagnosticKind::OperationFailed,
            detail: err.to_string(),
        },
    }
}

#[derive(Serialize)]
struct StoredValue<'a> {
    thread: usize,
    iteration: u64,
    written_at_ns: i64,
    text: &'a str,
}

const STORED_TEXT: &str = "strain worker value written by thread for iteration";

fn store_params(index: usize, iteration: u64) -> Result<Params, serde_json::Error> {
    let value = serde_json::to_value(StoredValue {
        thread: index,
        iteration,
        written_at_ns: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        text: STORED_TEXT,
    })?;
    let mut params = Params::new();
    params.insert("key".to_string(), Value::String(operation_key(index, iteration)));
    params.insert("value".to_string(), value);
    Ok(params)
}

fn retrieve_params(index: usize, iteration: u64, threads: usize, window: u64) -> Params {
    let partner = partner_of(index, threads);
    let mut params = Params::new();
    params.insert(
        "key".to_string(),
        Value::String(operation_key(partner, iteration % window.max(1))),
    );
    params
}

fn search_params(iteration: u64) -> Params {
    let term = SEARCH_TERMS[(iteration % SEARCH_TERMS.len() as u64) as usize];
    let mut params = Params::new();
    params.insert("query".to_string(), Value::String(term.to_string()));
    params
}

impl<'s, T: SystemUnderTest> WorkerContext<'s, T> {
    /// Build the request for `operation` on `iteration`
    fn params_for(&self, operation: Operation, iteration: u64) -> Result<Params, String> {
        match operation {
            Operation::Store => store_params(self.index, iteration).map_err(|e| e.to_string()),
            Operation::Retrieve => Ok(retrieve_params(
                self.index,
                iteration,
                self.config.threads,
                self.config.retrieve_window,
            )),
            Operation::Search => Ok(search_params(iteration)),
        }
    }

    /// Issue one call and classify it. A panic inside the target is
    /// contained here and reported as a failure.
    fn perform(&self, operation: Operation, iteration: u64, identity: &Identity) -> Outcome {
        let params = match self.params_for(operation, iteration) {
            Ok(params) => params,
            Err(detail) => {
                return Outcome::Failure {
                    kind: DiagnosticKind::ParameterConstruction,
                    detail,
                }
            }
        };

        let target = self.session.target();
        let call = panic::catch_unwind(AssertUnwindSafe(|| {
            target.execute(operation, &params, identity)
        }));
        match call {
            Ok(response) => classify(operation, &response),
            Err(payload) => Outcome::Failure {
                kind: DiagnosticKind::TargetPanicked,
                detail: panic_message(payload.as_ref()),
            },
        }
    }

    fn record(&self, operation: Operation, iteration: u64, outcome: Outcome, elapsed: Duration) {
        match outcome {
            Outcome::Success => self.session.record_success(self.role),
            Outcome::ExpectedMiss => self.session.record_expected_miss(self.role),
            Outcome::Failure { kind, detail } => self.session.record_failure(
                self.role,
                Diagnostic {
                    kind,
                    operation: Some(operation),
                    thread_index: self.index,
                    iteration,
                    detail,
                    elapsed,
                },
            ),
        }
    }

    /// Run this worker to completion.
    ///
    /// Only a barrier failure is returned as an error; every per-operation
    /// problem lands in the session instead.
    pub fn run(self) -> StrainResult<WorkerReport> {
        let identity = Identity::new(format!(
            "strain/{}/worker-{}",
            self.session.run_id(),
            self.index
        ));

        let arrival = match self.session.arrive(self.config.barrier_timeout()) {
            Ok(arrival) => arrival,
            Err(err) => {
                self.session.mark_completed();
                return Err(err);
            }
        };
        let started_at = arrival.started_at;
        let ceiling = self.config.duration();

        if self.role.needs_warmup() && !self.config.retrieve_warmup().is_zero() {
            std::thread::sleep(self.config.retrieve_warmup());
        }

        self.session.advance(RunPhase::Running);

        let mut iterations = 0;
        let mut stopped_early = false;
        for iteration in 0..self.config.ops_per_thread {
            if self.session.should_stop() {
                stopped_early = true;
                break;
            }
            let elapsed = started_at.elapsed();
            if elapsed > ceiling {
                if self.session.request_stop() {
                    tracing::warn!(
                        run_id = %self.session.run_id(),
                        worker = self.index,
                        ceiling_ms = ceiling.as_millis() as u64,
                        "duration ceiling reached, stopping workers"
                    );
                }
                stopped_early = true;
                break;
            }

            let operation = self.role.operation_for(iteration);
            let outcome = self.perform(operation, iteration, &identity);
            self.record(operation, iteration, outcome, elapsed);
            iterations += 1;
        }

        let done = self.session.mark_completed();
        tracing::debug!(
            run_id = %self.session.run_id(),
            worker = self.index,
            role = %self.role,
            iterations,
            stopped_early,
            completed = done,
            "worker finished"
        );
        Ok(WorkerReport {
            index: self.index,
            role: self.role,
            iterations,
            stopped_early,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    /// Records the instant of every call
    #[derive(Debug, Default)]
    struct Clocked {
        inner: MemoryStore,
        calls: Mutex<Vec<Instant>>,
    }

    impl SystemUnderTest for Clocked {
        fn execute(
            &self,
            operation: Operation,
            params: &Params,
            identity: &Identity,
        ) -> Result<Value, TargetError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.inner.execute(operation, params, identity)
        }
    }

    struct Panicky;

    impl SystemUnderTest for Panicky {
        fn execute(&self, operation: Operation, _: &Params, _: &Identity) -> Result<Value, TargetError> {
            if operation == Operation::Search {
                panic!("search exploded");
            }
            Ok(Value::Null)
        }
    }

    fn run_all<T: SystemUnderTest>(session: &Session<T>, config: &StressConfig) -> Vec<WorkerReport> {
        thread::scope(|s| {
            let handles: Vec<_> = (0..config.threads)
                .map(|index| {
                    let ctx = WorkerContext {
                        index,
                        role: config.assignment.role_for(index),
                        session,
                        config,
                    };
                    session.enlist(ctx.role);
                    s.spawn(move || ctx.run().unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_operation_key_is_deterministic() {
        assert_eq!(operation_key(3, 17), "strain:t3:i17");
        assert_eq!(operation_key(3, 17), operation_key(3, 17));
        assert_ne!(operation_key(1, 23), operation_key(12, 3));
    }

    #[test]
    fn test_partner_wraps() {
        assert_eq!(partner_of(0, 4), 1);
        assert_eq!(partner_of(3, 4), 0);
        assert_eq!(partner_of(0, 1), 0);
        assert_eq!(partner_of(0, 0), 0);
    }

    #[test]
    fn test_classify_retrieve_miss_is_expected() {
        let miss: Result<Value, TargetError> = Err(TargetError::NotFound { key: "k".into() });
        assert_eq!(classify(Operation::Retrieve, &miss), Outcome::ExpectedMiss);
    }

    #[test]
    fn test_classify_not_found_elsewhere_is_failure() {
        let miss: Result<Value, TargetError> = Err(TargetError::NotFound { key: "k".into() });
        assert!(matches!(
            classify(Operation::Search, &miss),
            Outcome::Failure {
                kind: DiagnosticKind::OperationFailed,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_success_and_failure() {
        assert_eq!(classify(Operation::Store, &Ok(json!(1))), Outcome::Success);
        let err: Result<Value, TargetError> = Err(TargetError::unavailable("down"));
        match classify(Operation::Retrieve, &err) {
            Outcome::Failure { detail, .. } => assert!(detail.contains("down")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_store_params_encode_thread_iteration_and_time() {
        let params = store_params(2, 9).unwrap();
        assert_eq!(params["key"], "strain:t2:i9");
        assert_eq!(params["value"]["thread"], 2);
        assert_eq!(params["value"]["iteration"], 9);
        assert!(params["value"]["written_at_ns"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_retrieve_params_read_partner_within_window() {
        let params = retrieve_params(3, 250, 4, 100);
        assert_eq!(params["key"], "strain:t0:i50");
    }

    #[test]
    fn test_search_params_cycle_vocabulary() {
        let terms: Vec<String> = (0..6)
            .map(|i| search_params(i)["query"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(terms[0], SEARCH_TERMS[0]);
        assert_eq!(terms[5], SEARCH_TERMS[0]);
    }

    #[test]
    fn test_no_call_precedes_barrier_release() {
        let config = StressConfig::mixed_default("clocked", WorkerRole::ALL, 8, 25)
            .with_retrieve_warmup(Duration::ZERO);
        let session = Session::new(Clocked::default(), config.threads);
        run_all(&session, &config);

        let started_at = session.started_at().unwrap();
        let calls = session.target().calls.lock().unwrap();
        assert_eq!(calls.len(), 8 * 25);
        assert!(calls.iter().all(|at| *at >= started_at));
    }

    #[test]
    fn test_retrieve_waits_out_warmup_after_release() {
        let warmup = Duration::from_millis(40);
        let config = StressConfig::single_role("warmup", WorkerRole::Retrieve, 2, 3)
            .with_retrieve_warmup(warmup);
        let session = Session::new(Clocked::default(), config.threads);
        run_all(&session, &config);

        let started_at = session.started_at().unwrap();
        let calls = session.target().calls.lock().unwrap();
        assert_eq!(calls.len(), 6);
        assert!(calls.iter().all(|at| at.duration_since(started_at) >= warmup));
    }

    #[test]
    fn test_retrieve_misses_are_not_diagnostics() {
        let config = StressConfig::single_role("misses", WorkerRole::Retrieve, 3, 20);
        let session = Session::new(MemoryStore::new(), config.threads);
        run_all(&session, &config);

        let counters = session.counters();
        assert_eq!(counters.total_ops, 60);
        assert_eq!(counters.expected_misses, 60);
        assert_eq!(counters.fail_ops, 0);
        assert_eq!(session.diagnostic_count(), 0);
    }

    #[test]
    fn test_target_panic_is_contained() {
        let config = StressConfig::single_role("panics", WorkerRole::Search, 2, 5);
        let session = Session::new(Panicky, config.threads);
        let reports = run_all(&session, &config);

        assert!(reports.iter().all(|r| r.iterations == 5));
        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.len(), 10);
        assert!(diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::TargetPanicked && d.detail.contains("exploded")));
    }

    #[test]
    fn test_stop_flag_ends_loops() {
        let config = StressConfig::single_role("stopped", WorkerRole::Store, 2, 1_000);
        let session = Session::new(MemoryStore::new(), config.threads);
        session.request_stop();
        let reports = run_all(&session, &config);

        assert!(reports.iter().all(|r| r.stopped_early && r.iterations == 0));
        assert_eq!(session.counters().total_ops, 0);
        assert_eq!(session.completed(), 2);
    }

    #[test]
    fn test_zero_duration_ceiling_stops_immediately() {
        let config = StressConfig::single_role("ceiling", WorkerRole::Store, 2, 1_000_000)
            .with_duration(Duration::ZERO);
        let session = Session::new(MemoryStore::new(), config.threads);
        let reports = run_all(&session, &config);

        assert!(reports.iter().all(|r| r.stopped_early));
        assert!(session.should_stop());
        let counters = session.counters();
        assert_eq!(counters.total_ops, counters.success_ops + counters.fail_ops);
    }
}
