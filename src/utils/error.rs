//! Error Handling
//!
//! Unified error types for the scheduler.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Scheduler-wide error type
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// No capability could be resolved for a target role (terminal, not retried)
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A task exceeded its deadline
    #[error("Task '{task_id}' timed out after {timeout_secs}s")]
    Timeout { task_id: String, timeout_secs: u64 },

    /// The capability call raised or returned an error
    #[error("Execution error: {0}")]
    Execution(String),

    /// Fix-contract violation: target file unresolvable, write failed,
    /// or read-after-write mismatch (terminal for the task)
    #[error("Fix contract error: {0}")]
    FixContract(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Execution was cancelled
    #[error("Cancelled")]
    Cancelled,
}

/// Result type alias for scheduler errors
pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a fix-contract error
    pub fn fix_contract(msg: impl Into<String>) -> Self {
        Self::FixContract(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this failure may be retried by the batch executor.
    ///
    /// Resolution and fix-contract violations are terminal: retrying
    /// without new information cannot succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Resolution(_) | Self::FixContract(_) | Self::Cancelled
        )
    }
}
