//! Error types for hostkit-transfer

use hostkit_exec::ExecError;
use thiserror::Error;

/// Errors that can occur while preparing or running a transfer
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    /// Execution error from the acting host
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// An option has a shape the copy command cannot take
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// No copy strategy has this name
    #[error("unknown copy method '{0}'")]
    UnknownMethod(String),
}

impl TransferError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::Exec(e) if e.is_retryable())
    }
}
