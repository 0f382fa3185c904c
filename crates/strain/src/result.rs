//! Result and error types for Strain.
//!
//! Only faults in the harness itself surface here. Failures of individual
//! operations against the target are contained in the worker and end up as
//! [`crate::Diagnostic`] records instead.

use thiserror::Error;

/// Result type for Strain operations
pub type StrainResult<T> = Result<T, StrainError>;

/// Errors that can occur in Strain
#[derive(Debug, Error)]
pub enum StrainError {
    /// Run configuration rejected before any thread started
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// The OS refused to create a worker thread
    #[error("Failed to spawn worker {index}: {source}")]
    ThreadSpawn {
        /// Worker index that could not be spawned
        index: usize,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// Workers never reached the start barrier together
    #[error("Start barrier timed out after {ms}ms ({arrived}/{expected} workers arrived)")]
    BarrierTimeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Workers that had arrived when the wait gave up
        arrived: usize,
        /// Workers the barrier was waiting for
        expected: usize,
    },

    /// The start barrier was torn down before it released
    #[error("Start barrier aborted: {message}")]
    BarrierAborted {
        /// Error message
        message: String,
    },

    /// A worker thread panicked outside of a target call
    #[error("Worker {index} panicked: {message}")]
    WorkerPanicked {
        /// Worker index
        index: usize,
        /// Panic payload, if it was a string
        message: String,
    },

    /// Suite definition could not be loaded
    #[error("Failed to load suite: {message}")]
    SuiteLoad {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl StrainError {
    /// Create a configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a suite loading error
    #[must_use]
    pub fn suite_load(message: impl Into<String>) -> Self {
        Self::SuiteLoad {
            message: message.into(),
        }
    }

    /// Whether this error came from thread coordination rather than input
    #[must_use]
    pub const fn is_synchronization_failure(&self) -> bool {
        matches!(
            self,
            Self::ThreadSpawn { .. }
                | Self::BarrierTimeout { .. }
                | Self::BarrierAborted { .. }
                | Self::WorkerPanicked { .. }
        )
    }
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
