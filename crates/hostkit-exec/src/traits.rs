//! Host trait

use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error};

use crate::command::{Command, FormattedCommand};
use crate::controls::{Controls, ControlsGuard, ControlsOverride, HostState};
use crate::error::ExecError;
use crate::result::{ExecutionResult, RawOutput, UNKNOWN_STATUS};

/// Kind of execution target, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Local,
    Remote,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKind::Local => write!(f, "local"),
            HostKind::Remote => write!(f, "remote"),
        }
    }
}

/// Principal and address a connected remote host talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub user: String,
    pub address: IpAddr,
}

/// An execution target
///
/// Implementors provide the transport (`run`) and the file primitives;
/// formatting, controls, timeouts, decoding and return-code bookkeeping are
/// shared through the provided methods.
#[async_trait]
pub trait Host: Send + Sync {
    /// Controls and last return code
    fn state(&self) -> &HostState;

    /// Local or remote
    fn kind(&self) -> HostKind;

    /// Principal and effective address, for connected remote hosts
    fn endpoint(&self) -> Option<Endpoint> {
        None
    }

    /// Run an already formatted command
    async fn run(&self, command: &FormattedCommand) -> Result<RawOutput, ExecError>;

    /// Read a whole file
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError>;

    /// Write (or append to) a file, creating it when missing
    async fn write_file(&self, path: &str, content: &[u8], append: bool)
    -> Result<(), ExecError>;

    /// Snapshot of the current controls
    fn controls(&self) -> Controls {
        self.state().controls()
    }

    /// Override controls until the returned guard is dropped
    fn set_controls(&self, overrides: &ControlsOverride) -> ControlsGuard<'_> {
        self.state().scoped(overrides)
    }

    /// Return code of the last command (-1 when unknown)
    fn return_code(&self) -> i32 {
        self.state().return_code()
    }

    /// Execute a command and decode its output
    async fn execute(&self, command: Command) -> Result<ExecutionResult, ExecError> {
        let controls = self.controls();
        let raw = run_with_controls(self, &controls, &command).await?;
        Ok(ExecutionResult::decode(&raw, controls.decode))
    }

    /// Execute a command and return its undecoded output
    async fn execute_raw(&self, command: Command) -> Result<RawOutput, ExecError> {
        let controls = self.controls();
        run_with_controls(self, &controls, &command).await
    }

    /// Get executor type name
    fn executor_type(&self) -> &'static str {
        match self.kind() {
            HostKind::Local => "local",
            HostKind::Remote => "ssh",
        }
    }
}

async fn run_with_controls<H>(
    host: &H,
    controls: &Controls,
    command: &Command,
) -> Result<RawOutput, ExecError>
where
    H: Host + ?Sized,
{
    let formatted = command.format(controls);
    debug!(
        executor = host.executor_type(),
        command = %formatted,
        interactive = formatted.interactive,
        "executing command"
    );

    let result = with_deadline(controls.timeout, &formatted, host.run(&formatted)).await;
    match &result {
        Ok(raw) => {
            host.state().set_return_code(raw.status);
            debug!(
                command = %formatted,
                status = raw.status,
                duration = ?raw.duration,
                "command completed"
            );
        }
        Err(_) => host.state().set_return_code(UNKNOWN_STATUS),
    }
    result
}

/// Bound a transport future by the optional deadline
pub(crate) async fn with_deadline<F>(
    limit: Option<Duration>,
    command: &FormattedCommand,
    fut: F,
) -> Result<RawOutput, ExecError>
where
    F: Future<Output = Result<RawOutput, ExecError>>,
{
    let Some(limit) = limit else {
        return fut.await;
    };
    let start = Instant::now();

    match timeout(limit, fut).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            error!(
                command = %command,
                timeout = ?limit,
                elapsed = ?start.elapsed(),
                "command timed out"
            );
            Err(ExecError::Timeout { timeout: limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Host that records formatted commands and replays canned output
    struct ScriptedHost {
        state: HostState,
        seen: Mutex<Vec<String>>,
        reply: RawOutput,
        delay: Option<Duration>,
    }

    impl ScriptedHost {
        fn new(status: i32, stdout: &[u8]) -> Self {
            Self {
                state: HostState::default(),
                seen: Mutex::new(Vec::new()),
                reply: RawOutput {
                    status,
                    stdout: stdout.to_vec(),
                    stderr: Vec::new(),
                    duration: Duration::from_millis(1),
                },
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Host for ScriptedHost {
        fn state(&self) -> &HostState {
            &self.state
        }

        fn kind(&self) -> HostKind {
            HostKind::Local
        }

        async fn run(&self, command: &FormattedCommand) -> Result<RawOutput, ExecError> {
            self.seen.lock().unwrap().push(command.render());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.reply.clone())
        }

        async fn read_file(&self, _path: &str) -> Result<Vec<u8>, ExecError> {
            Ok(Vec::new())
        }

        async fn write_file(&self, _: &str, _: &[u8], _: bool) -> Result<(), ExecError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_execute_formats_decodes_and_records_status() {
        let host = ScriptedHost::new(0, b"Linux\n");

        let result = host
            .execute(Command::new("uname").opt("s", true))
            .await
            .unwrap();

        assert_eq!(result.stdout, "Linux");
        assert!(result.success);
        assert_eq!(host.return_code(), 0);
        assert_eq!(
            host.seen.lock().unwrap().as_slice(),
            ["LC_ALL=en_US.utf-8 uname -s"]
        );
    }

    #[tokio::test]
    async fn test_scoped_override_applies_to_execution() {
        let host = ScriptedHost::new(0, &[0xe9]);

        {
            let _guard = host.set_controls(
                &ControlsOverride::new()
                    .locale("")
                    .decode(crate::controls::Charset::Latin1),
            );
            let result = host.execute(Command::new("cat").arg("x")).await.unwrap();
            assert_eq!(result.stdout, "é");
        }

        host.execute(Command::new("true")).await.unwrap();
        let seen = host.seen.lock().unwrap();
        assert_eq!(seen[0], "cat x");
        assert_eq!(seen[1], "LC_ALL=en_US.utf-8 true");
    }

    #[tokio::test]
    async fn test_deadline_resets_return_code() {
        let mut host = ScriptedHost::new(0, b"");
        host.delay = Some(Duration::from_secs(5));
        host.state.set_return_code(0);

        let _guard = host.set_controls(
            &ControlsOverride::new().timeout(Some(Duration::from_millis(50))),
        );
        let result = host.execute(Command::new("sleep").arg("5")).await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
        assert_eq!(host.return_code(), -1);
    }

    #[test]
    fn test_executor_type() {
        let host = ScriptedHost::new(0, b"");
        assert_eq!(host.executor_type(), "local");
        assert_eq!(host.endpoint(), None);
    }
}
