//! The system under test.
//!
//! Strain drives load against anything that can answer three operations:
//! `store`, `retrieve` and `search`. Calls go straight through to the target
//! with no locking on the harness side, so the target must be safe to call
//! from many threads at once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Structured key/value payload passed with every call
pub type Params = Map<String, Value>;

/// Operation understood by a [`SystemUnderTest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Write one keyed entry
    Store,
    /// Read one keyed entry
    Retrieve,
    /// Read-only query
    Search,
}

impl Operation {
    /// All operations, in wire-name order
    pub const ALL: [Self; 3] = [Self::Store, Self::Retrieve, Self::Search];

    /// Operation name as the target sees it
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Retrieve => "retrieve",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "store" => Ok(Self::Store),
            "retrieve" => Ok(Self::Retrieve),
            "search" => Ok(Self::Search),
            _ => Err(format!("Unknown operation: {}", s)),
        }
    }
}

/// Caller identity attached to each call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Principal name, e.g. `strain/<run-id>/worker-3`
    pub principal: String,
}

impl Identity {
    /// Create an identity
    #[must_use]
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.principal)
    }
}

/// Failure reported by the target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// Requested key does not exist
    #[error("not found: {key}")]
    NotFound {
        /// Key that was looked up
        key: String,
    },

    /// The call was malformed or refused
    #[error("rejected: {message}")]
    Rejected {
        /// Error message
        message: String,
    },

    /// The target could not serve the call
    #[error("unavailable: {message}")]
    Unavailable {
        /// Error message
        message: String,
    },
}

impl TargetError {
    /// Create a rejection
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create an unavailability error
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Whether this is the typed "not found" condition
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A stateful store/retrieve/search capability under stress.
pub trait SystemUnderTest: Send + Sync {
    /// Execute one operation.
    fn execute(
        &self,
        operation: Operation,
        params: &Params,
        identity: &Identity,
    ) -> Result<Value, TargetError>;

    /// Short name used in logs and reports
    fn name(&self) -> &str {
        "target"
    }
}

impl<T: SystemUnderTest + ?Sized> SystemUnderTest for Arc<T> {
    fn execute(
        &self,
        operation: Operation,
        params: &Params,
        identity: &Identity,
    ) -> Result<Value, TargetError> {
        (**self).execute(operation, params, identity)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: SystemUnderTest + ?Sized> SystemUnderTest for &T {
    fn execute(
        &self,
        operation: Operation,
        params: &Params,
        identity: &Identity,
    ) -> Result<Value, TargetError> {
        (**self).execute(operation, params, identity)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: SystemUnderTest + ?Sized> SystemUnderTest for Box<T> {
    fn execute(
        &self,
        operation: Operation,
        params: &Params,
        identity: &Identity,
    ) -> Result<Value, TargetError> {
        (**self).execute(operation, params, identity)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
