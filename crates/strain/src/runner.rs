//! Stress runner.
//!
//! Builds one [`WorkerContext`] per thread up front, spawns them all inside a
//! [`std::thread::scope`], joins every handle, then aggregates. The session
//! and the target it owns are dropped only after the last join.

use crate::aggregate::Metrics;
use crate::config::StressConfig;
use crate::harness::TestResult;
use crate::result::{panic_message, StrainError, StrainResult};
use crate::session::{RunPhase, Session};
use crate::target::SystemUnderTest;
use crate::worker::{WorkerContext, WorkerReport};
use std::thread;
use std::time::Instant;

/// Runs one stress configuration against a target
#[derive(Debug, Clone)]
pub struct StressRunner {
    config: StressConfig,
}

impl StressRunner {
    /// Create a runner for `config`
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Configuration this runner uses
    #[must_use]
    pub const fn config(&self) -> &StressConfig {
        &self.config
    }

    /// Run the configured workers against `target` and judge the result.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration or a harness fault:
    /// a thread that could not be spawned, a barrier that never released, or
    /// a worker that panicked outside a target call. Failures of individual
    /// operations are never errors; they are counted in the result.
    pub fn run<T: SystemUnderTest>(&self, target: T) -> StrainResult<TestResult> {
        let config = &self.config;
        config.validate()?;

        let session = Session::new(target, config.threads);
        tracing::info!(
            run_id = %session.run_id(),
            test = %config.name,
            system = session.target().name(),
            threads = config.threads,
            ops_per_thread = config.ops_per_thread,
            assignment = %config.assignment,
            "starting stress run"
        );

        let start = Instant::now();
        let reports = match self.spawn_and_join(&session) {
            Ok(reports) => reports,
            Err(err) => {
                tracing::error!(
                    run_id = %session.run_id(),
                    test = %config.name,
                    phase = %session.phase(),
                    error = %err,
                    "stress run failed"
                );
                return Err(err);
            }
        };
        let elapsed = start.elapsed();
        session.advance(RunPhase::AllThreadsJoined);

        let snapshot = session.snapshot();
        let metrics = Metrics::from_counters(&snapshot.counters, elapsed);
        let evaluation = config.criteria.evaluate(&metrics);
        session.advance(RunPhase::Aggregated);

        let run_id = session.run_id();
        drop(session);
        tracing::debug!(run_id = %run_id, "session torn down");

        let iterations: u64 = reports.iter().map(|r| r.iterations).sum();
        tracing::info!(
            run_id = %run_id,
            test = %config.name,
            verdict = %evaluation.verdict,
            total_ops = metrics.total_ops,
            fail_ops = metrics.fail_ops,
            iterations,
            throughput = metrics.throughput,
            duration_ms = metrics.duration_ms,
            "stress run finished"
        );

        Ok(TestResult::from_run(
            &config.name,
            config.threads,
            snapshot,
            &metrics,
            evaluation,
            elapsed,
        ))
    }

    fn spawn_and_join<T: SystemUnderTest>(
        &self,
        session: &Session<T>,
    ) -> StrainResult<Vec<WorkerReport>> {
        let config = &self.config;
        let tasks: Vec<WorkerContext<'_, T>> = (0..config.threads)
            .map(|index| WorkerContext {
                index,
                role: config.assignment.role_for(index),
                session,
                config,
            })
            .collect();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(tasks.len());
            let mut root_cause = None;

            for ctx in tasks {
                session.enlist(ctx.role);
                let spawned = thread::Builder::new()
                    .name(format!("strain-worker-{}", ctx.index))
                    .spawn_scoped(scope, move || ctx.run());
                match spawned {
                    Ok(handle) => handles.push((ctx.index, handle)),
                    Err(source) => {
                        session
                            .barrier()
                            .abort(format!("worker {} could not be spawned", ctx.index));
                        root_cause = Some(StrainError::ThreadSpawn {
                            index: ctx.index,
                            source,
                        });
                        break;
                    }
                }
            }
            if root_cause.is_none() {
                session.advance(RunPhase::AllThreadsSpawned);
            }

            let mut reports = Vec::with_capacity(handles.len());
            for (index, handle) in handles {
                match handle.join() {
                    Ok(Ok(report)) => reports.push(report),
                    Ok(Err(err)) => keep_root_cause(&mut root_cause, err),
                    Err(payload) => keep_root_cause(
                        &mut root_cause,
                        StrainError::WorkerPanicked {
                            index,
                            message: panic_message(payload.as_ref()),
                        },
                    ),
                }
            }

            match root_cause {
                Some(err) => Err(err),
                None => Ok(reports),
            }
        })
    }
}

/// An aborted barrier is a consequence; anything else is the cause.
fn keep_root_cause(slot: &mut Option<StrainError>, err: StrainError) {
    let replace = match slot {
        None => true,
        Some(StrainError::BarrierAborted { .. }) => {
            !matches!(err, StrainError::BarrierAborted { .. })
        }
        Some(_) => false,
    };
    if replace {
        *slot = Some(err);
    }
}

/// Run `config` against `target` once
///
/// # Errors
///
/// See [`StressRunner::run`].
pub fn run_stress_test<T: SystemUnderTest>(
    config: StressConfig,
    target: T,
) -> StrainResult<TestResult> {
    StressRunner::new(config).run(target)
}
