//! Error types for hostkit-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while connecting to or executing on a host
///
/// A command that runs and exits non-zero is not an error: it is reported as
/// an unsuccessful [`ExecutionResult`](crate::ExecutionResult).
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Neither an IPv4 nor an IPv6 address could be resolved for the target
    #[error("unable to resolve an IPv4 or an IPv6 address for '{0}'")]
    Unreachable(String),

    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Channel could not be opened or the SSH protocol failed mid-command
    #[error("channel error: {0}")]
    Channel(String),

    /// Connection not established
    #[error("not connected: you must be connected to a host before executing commands")]
    NotConnected,

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ExecError {
    /// Check if error belongs to the connection family
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ExecError::Unreachable(_)
                | ExecError::ConnectionFailed(_)
                | ExecError::AuthenticationFailed(_)
                | ExecError::Channel(_)
                | ExecError::NotConnected
        )
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_) | ExecError::Timeout { .. }
        )
    }
}

impl From<russh::Error> for ExecError {
    fn from(err: russh::Error) -> Self {
        ExecError::Channel(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_family() {
        assert!(ExecError::NotConnected.is_connection_error());
        assert!(ExecError::Unreachable("nowhere".into()).is_connection_error());
        assert!(ExecError::AuthenticationFailed("denied".into()).is_connection_error());

        let timeout = ExecError::Timeout {
            timeout: Duration::from_secs(1),
        };
        assert!(!timeout.is_connection_error());
        assert!(timeout.is_retryable());
    }

    #[test]
    fn test_unreachable_message() {
        let err = ExecError::Unreachable("ghost.invalid".into());
        assert_eq!(
            err.to_string(),
            "unable to resolve an IPv4 or an IPv6 address for 'ghost.invalid'"
        );
    }
}
