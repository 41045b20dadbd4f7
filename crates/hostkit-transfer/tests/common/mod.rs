//! Recording host for transfer tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hostkit_exec::{
    Endpoint, ExecError, FormattedCommand, Host, HostKind, HostState, RawOutput,
};

/// Host that records every command and answers with one canned output
pub struct RecordingHost {
    state: HostState,
    kind: HostKind,
    endpoint: Option<Endpoint>,
    reply: RawOutput,
    seen: Mutex<Vec<FormattedCommand>>,
}

impl RecordingHost {
    pub fn local() -> Self {
        Self {
            state: HostState::default(),
            kind: HostKind::Local,
            endpoint: None,
            reply: RawOutput {
                status: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
                duration: Duration::from_millis(1),
            },
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A remote host, connected when an endpoint is given
    pub fn remote(endpoint: Option<(&str, &str)>) -> Self {
        Self {
            kind: HostKind::Remote,
            endpoint: endpoint.map(|(user, address)| Endpoint {
                user: user.to_string(),
                address: address.parse().unwrap(),
            }),
            ..Self::local()
        }
    }

    pub fn replying(mut self, status: i32, stderr: &str) -> Self {
        self.reply.status = status;
        self.reply.stderr = stderr.as_bytes().to_vec();
        self
    }

    pub fn commands(&self) -> Vec<FormattedCommand> {
        self.seen.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.commands().iter().map(FormattedCommand::render).collect()
    }
}

#[async_trait]
impl Host for RecordingHost {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn kind(&self) -> HostKind {
        self.kind
    }

    fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.clone()
    }

    async fn run(&self, command: &FormattedCommand) -> Result<RawOutput, ExecError> {
        self.seen.lock().unwrap().push(command.clone());
        Ok(self.reply.clone())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError> {
        Err(ExecError::IoError(format!("{path}: no files here")))
    }

    async fn write_file(&self, _: &str, _: &[u8], _: bool) -> Result<(), ExecError> {
        Ok(())
    }
}
