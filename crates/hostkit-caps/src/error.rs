//! Error types for hostkit-caps

use hostkit_exec::{ExecError, ExecutionResult};
use thiserror::Error;

/// Errors that can occur while querying or changing a host
#[derive(Error, Debug, Clone)]
pub enum CapabilityError {
    /// Execution error from the host
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Command ran but exited non-zero
    #[error("command failed: {status} - {message}")]
    CommandFailed {
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Path, user or group does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Path exists but is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Failed to parse command output
    #[error("parse error: {0}")]
    ParseError(String),
}

impl CapabilityError {
    /// Failure built from an unsuccessful result
    ///
    /// Carries stderr, or stdout when stderr is empty.
    #[must_use]
    pub fn from_result(result: &ExecutionResult) -> Self {
        let message = if result.stderr.is_empty() {
            result.stdout.clone()
        } else {
            result.stderr.clone()
        };
        CapabilityError::CommandFailed {
            status: result.status,
            message,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CapabilityError::Exec(e) if e.is_retryable())
    }

    /// Check if error means the target is missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CapabilityError::NotFound(_))
    }
}
