//! Start barrier for worker threads.
//!
//! Every worker calls [`StartBarrier::arrive_and_wait`] once before its
//! measured loop. The last one to arrive stamps the start instant and wakes
//! the others without blocking itself. The barrier is single-use: a run
//! creates one and drops it with the session.
//!
//! The arrival counter is bumped before the gate mutex is taken, and the gate
//! flag is only written and read under that mutex, so a wake-up can never be
//! missed. Waiters loop on the flag, which makes spurious wake-ups harmless.

use crate::result::{StrainError, StrainResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Gate {
    Closed,
    Released,
    Aborted(String),
}

/// What a worker learns when it passes the barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    /// Instant recorded by the last arriving worker
    pub started_at: Instant,
    /// Whether this caller was the one that released the barrier
    pub released_by_me: bool,
}

/// One-shot rendezvous for a fixed number of threads
#[derive(Debug)]
pub struct StartBarrier {
    expected: usize,
    ready: AtomicUsize,
    gate: Mutex<Gate>,
    released: Condvar,
    started_at: OnceLock<Instant>,
}

impl StartBarrier {
    /// Create a barrier for `expected` workers
    #[must_use]
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            ready: AtomicUsize::new(0),
            gate: Mutex::new(Gate::Closed),
            released: Condvar::new(),
            started_at: OnceLock::new(),
        }
    }

    /// Workers the barrier waits for
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }

    /// Workers that have arrived so far
    #[must_use]
    pub fn arrived(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    /// Start instant, once the barrier has released
    #[must_use]
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at.get().copied()
    }

    /// Whether the barrier has released its waiters
    #[must_use]
    pub fn is_released(&self) -> bool {
        *self.lock_gate() == Gate::Released
    }

    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `expected` callers have arrived or `timeout` elapses.
    ///
    /// A timeout aborts the barrier for everyone still waiting, so one stuck
    /// rendezvous does not leave the other workers blocked for their own
    /// full timeout.
    pub fn arrive_and_wait(&self, timeout: Duration) -> StrainResult<Arrival> {
        let arrived = self.ready.fetch_add(1, Ordering::SeqCst) + 1;
        let mut gate = self.lock_gate();

        if let Gate::Aborted(reason) = &*gate {
            return Err(StrainError::BarrierAborted {
                message: reason.clone(),
            });
        }

        if arrived > self.expected {
            return Err(StrainError::BarrierAborted {
                message: format!(
                    "arrival {} exceeds the {} workers this barrier was built for",
                    arrived, self.expected
                ),
            });
        }

        if arrived == self.expected {
            let started_at = *self.started_at.get_or_init(Instant::now);
            *gate = Gate::Released;
            drop(gate);
            self.released.notify_all();
            return Ok(Arrival {
                started_at,
                released_by_me: true,
            });
        }

        let deadline = Instant::now() + timeout;
        loop {
            match &*gate {
                Gate::Released => {
                    let started_at = self.started_at.get().copied().ok_or_else(|| {
                        StrainError::BarrierAborted {
                            message: "released without a start instant".to_string(),
                        }
                    })?;
                    return Ok(Arrival {
                        started_at,
                        released_by_me: false,
                    });
                }
                Gate::Aborted(reason) => {
                    return Err(StrainError::BarrierAborted {
                        message: reason.clone(),
                    });
                }
                Gate::Closed => {}
            }

            let now = Instant::now();
            if now >= deadline {
                let arrived = self.arrived();
                *gate = Gate::Aborted(format!(
                    "timed out with {}/{} workers arrived",
                    arrived, self.expected
                ));
                drop(gate);
                self.released.notify_all();
                return Err(StrainError::BarrierTimeout {
                    ms: timeout.as_millis() as u64,
                    arrived,
                    expected: self.expected,
                });
            }

            gate = self
                .released
                .wait_timeout(gate, deadline - now)
                .map_or_else(|e| e.into_inner().0, |(g, _)| g);
        }
    }

    /// Wake every waiter with an error. No effect once released.
    pub fn abort(&self, reason: impl Into<String>) {
        let mut gate = self.lock_gate();
        if *gate == Gate::Closed {
            *gate = Gate::Aborted(reason.into());
            drop(gate);
            self.released.notify_all();
        }
    }
}
