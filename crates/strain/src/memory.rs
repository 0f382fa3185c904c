//! In-memory targets.
//!
//! [`MemoryStore`] is a small thread-safe key/value store with substring
//! search, enough to exercise every worker role. [`FaultInjector`] wraps any
//! target and fails a deterministic share of one operation's calls.

use crate::target::{Identity, Operation, Params, SystemUnderTest, TargetError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Default number of keys returned by `search`
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

fn required_str<'a>(params: &'a Params, field: &str) -> Result<&'a str, TargetError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| TargetError::rejected(format!("missing string parameter '{}'", field)))
}

/// Thread-safe in-memory store/retrieve/search target
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
    calls: [AtomicU64; 3],
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls received for one operation
    #[must_use]
    pub fn calls(&self, operation: Operation) -> u64 {
        self.calls[operation as usize].load(Ordering::SeqCst)
    }

    fn store(&self, params: &Params) -> Result<Value, TargetError> {
        let key = required_str(params, "key")?;
        let value = params
            .get("value")
            .cloned()
            .ok_or_else(|| TargetError::rejected("missing parameter 'value'"))?;
        let previous = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(json!({ "key": key, "replaced": previous.is_some() }))
    }

    fn retrieve(&self, params: &Params) -> Result<Value, TargetError> {
        let key = required_str(params, "key")?;
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| TargetError::NotFound {
                key: key.to_string(),
            })
    }

    fn search(&self, params: &Params) -> Result<Value, TargetError> {
        let query = required_str(params, "query")?;
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_SEARCH_LIMIT, |l| l as usize);

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<&str> = entries
            .iter()
            .filter(|(key, value)| key.contains(query) || value.to_string().contains(query))
            .map(|(key, _)| key.as_str())
            .collect();
        matches.sort_unstable();
        matches.truncate(limit);
        Ok(json!({ "query": query, "count": matches.len(), "matches": matches }))
    }
}

impl SystemUnderTest for MemoryStore {
    fn execute(
        &self,
        operation: Operation,
        params: &Params,
        _identity: &Identity,
    ) -> Result<Value, TargetError> {
        self.calls[operation as usize].fetch_add(1, Ordering::SeqCst);
        match operation {
            Operation::Store => self.store(params),
            Operation::Retrieve => self.retrieve(params),
            Operation::Search => self.search(params),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Which calls a [`FaultInjector`] fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPlan {
    /// Operation to fail
    pub operation: Operation,
    /// Fail every n-th call of that operation
    pub every: u64,
}

impl FaultPlan {
    /// Fail every `every`-th call of `operation`
    #[must_use]
    pub const fn every_nth(operation: Operation, every: u64) -> Self {
        Self { operation, every }
    }
}

/// Fresh in-memory target, wrapped in a [`FaultInjector`] when a plan is given
#[must_use]
pub fn memory_target(plan: Option<FaultPlan>) -> Box<dyn SystemUnderTest> {
    match plan {
        Some(plan) => Box::new(FaultInjector::new(
            MemoryStore::new(),
            plan.operation,
            plan.every,
        )),
        None => Box::new(MemoryStore::new()),
    }
}

/// Fails every n-th call of one operation on the wrapped target.
///
/// The counter is shared by all callers, so across threads exactly
/// `calls / every` calls fail no matter how they interleave.
#[derive(Debug)]
pub struct FaultInjector<T> {
    inner: T,
    operation: Operation,
    every: u64,
    seen: AtomicU64,
    injected: AtomicU64,
}

impl<T: SystemUnderTest> FaultInjector<T> {
    /// Fail every `every`-th call of `operation`. `every == 0` disables injection.
    #[must_use]
    pub const fn new(inner: T, operation: Operation, every: u64) -> Self {
        Self {
            inner,
            operation,
            every,
            seen: AtomicU64::new(0),
            injected: AtomicU64::new(0),
        }
    }

    /// Number of failures injected so far
    #[must_use]
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    /// Wrapped target
    #[must_use]
    pub const fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: SystemUnderTest> SystemUnderTest for FaultInjector<T> {
    fn execute(
        &self,
        operation: Operation,
        params: &Params,
        identity: &Identity,
    ) -> Result<Value, TargetError> {
        if operation == self.operation && self.every > 0 {
            let nth = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if nth % self.every == 0 {
                self.injected.fetch_add(1, Ordering::SeqCst);
                return Err(TargetError::unavailable(format!(
                    "injected fault on {} call #{}",
                    operation, nth
                )));
            }
        }
        self.inner.execute(operation, params, identity)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
