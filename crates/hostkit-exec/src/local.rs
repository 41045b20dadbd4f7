//! Local command execution using `tokio::process`

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::command::FormattedCommand;
use crate::controls::{Controls, HostState};
use crate::error::ExecError;
use crate::result::{RawOutput, UNKNOWN_STATUS};
use crate::traits::{Host, HostKind};

/// The local machine
///
/// Commands run through `sh -c` as child processes of the caller.
#[derive(Debug, Default)]
pub struct LocalHost {
    state: HostState,
}

impl LocalHost {
    /// Create a local host with default controls
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a local host with the given controls
    #[must_use]
    pub fn with_controls(controls: Controls) -> Self {
        Self {
            state: HostState::new(controls),
        }
    }

    fn shell(command: &FormattedCommand) -> Command {
        let mut child = Command::new("sh");
        child.arg("-c").arg(command.render()).kill_on_drop(true);
        child
    }
}

#[async_trait]
impl Host for LocalHost {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn kind(&self) -> HostKind {
        HostKind::Local
    }

    #[instrument(skip(self, command), fields(command = %command), level = "debug")]
    async fn run(&self, command: &FormattedCommand) -> Result<RawOutput, ExecError> {
        let start = Instant::now();

        if command.interactive {
            let mut child = Self::shell(command);
            child
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());

            let mut process = match child.spawn() {
                Ok(process) => process,
                Err(e) => return Ok(launch_failure(command, &e)),
            };
            let status = process
                .wait()
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;

            return Ok(RawOutput::streamed(
                status.code().unwrap_or(UNKNOWN_STATUS),
                start.elapsed(),
            ));
        }

        let mut child = Self::shell(command);
        child
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let process = match child.spawn() {
            Ok(process) => process,
            Err(e) => return Ok(launch_failure(command, &e)),
        };
        let output = process
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let status = output.status.code().unwrap_or(UNKNOWN_STATUS);
        if !output.status.success() {
            debug!(
                status = status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "command exited non-zero"
            );
        }

        Ok(RawOutput {
            status,
            stdout: output.stdout,
            stderr: output.stderr,
            duration: start.elapsed(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| ExecError::IoError(format!("{path}: {e}")))
    }

    #[instrument(skip(self, content), fields(len = content.len()), level = "debug")]
    async fn write_file(&self, path: &str, content: &[u8], append: bool) -> Result<(), ExecError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .await
            .map_err(|e| ExecError::IoError(format!("{path}: {e}")))?;

        file.write_all(content)
            .await
            .map_err(|e| ExecError::IoError(format!("{path}: {e}")))?;
        file.flush()
            .await
            .map_err(|e| ExecError::IoError(format!("{path}: {e}")))
    }
}

fn launch_failure(command: &FormattedCommand, err: &std::io::Error) -> RawOutput {
    error!(command = %command, error = %err, "failed to launch command");
    RawOutput::launch_failure(err.to_string())
}
