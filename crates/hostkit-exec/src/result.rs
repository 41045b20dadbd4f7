//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controls::Charset;

/// Status recorded when no exit status is known
pub const UNKNOWN_STATUS: i32 = -1;

/// Result of a command execution
///
/// Always fully populated: interactive runs carry empty output strings because
/// the output was already streamed to the caller's terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the command exited with status 0
    pub success: bool,
    /// Exit status code (-1 when unknown)
    pub status: i32,
    /// Decoded stdout, trailing newlines trimmed
    pub stdout: String,
    /// Decoded stderr, trailing newlines trimmed
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl ExecutionResult {
    /// Decode a raw output with the given charset
    #[must_use]
    pub fn decode(raw: &RawOutput, charset: Charset) -> Self {
        Self {
            success: raw.success(),
            status: raw.status,
            stdout: trim_trailing(charset.decode(&raw.stdout)),
            stderr: trim_trailing(charset.decode(&raw.stderr)),
            duration: raw.duration,
        }
    }

    /// Build a failed result carrying a diagnostic in the stderr slot
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: UNKNOWN_STATUS,
            stdout: String::new(),
            stderr: message.into(),
            duration: Duration::ZERO,
        }
    }

    /// Lines of stdout
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    /// Combine stdout and stderr
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Undecoded output of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    /// Exit status code (-1 when unknown)
    pub status: i32,
    /// Raw stdout bytes
    pub stdout: Vec<u8>,
    /// Raw stderr bytes
    pub stderr: Vec<u8>,
    /// Time taken to execute
    pub duration: Duration,
}

impl RawOutput {
    /// Output of an interactive run: nothing captured
    #[must_use]
    pub fn streamed(status: i32, duration: Duration) -> Self {
        Self {
            status,
            stdout: Vec::new(),
            stderr: Vec::new(),
            duration,
        }
    }

    /// Output of a process that could not be launched
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            status: UNKNOWN_STATUS,
            stdout: Vec::new(),
            stderr: message.into().into_bytes(),
            duration: Duration::ZERO,
        }
    }

    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

fn trim_trailing(mut text: String) -> String {
    let keep = text.trim_end_matches(['\n', '\r']).len();
    text.truncate(keep);
    text
}
