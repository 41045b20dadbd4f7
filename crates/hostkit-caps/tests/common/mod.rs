//! Scripted host for capability tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hostkit_exec::{ExecError, FormattedCommand, Host, HostKind, HostState, RawOutput};

struct Rule {
    fragment: String,
    output: RawOutput,
}

/// Host answering commands from canned rules and recording what it ran
pub struct MockHost {
    state: HostState,
    rules: Vec<Rule>,
    seen: Mutex<Vec<String>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: HostState::default(),
            rules: Vec::new(),
            seen: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Answer commands containing `fragment`
    pub fn on(self, fragment: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.on_bytes(fragment, status, stdout.as_bytes(), stderr)
    }

    pub fn on_bytes(mut self, fragment: &str, status: i32, stdout: &[u8], stderr: &str) -> Self {
        self.rules.push(Rule {
            fragment: fragment.to_string(),
            output: RawOutput {
                status,
                stdout: stdout.to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                duration: Duration::from_millis(1),
            },
        });
        self
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        self
    }

    /// Rendered commands, in order
    pub fn commands(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl Host for MockHost {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn kind(&self) -> HostKind {
        HostKind::Remote
    }

    async fn run(&self, command: &FormattedCommand) -> Result<RawOutput, ExecError> {
        let rendered = command.render();
        self.seen.lock().unwrap().push(rendered.clone());
        let output = self
            .rules
            .iter()
            .find(|rule| rendered.contains(&rule.fragment))
            .map(|rule| rule.output.clone())
            .unwrap_or_else(|| RawOutput::streamed(0, Duration::ZERO));
        Ok(output)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError> {
        self.file(path)
            .ok_or_else(|| ExecError::IoError(format!("{path}: no such file")))
    }

    async fn write_file(&self, path: &str, content: &[u8], append: bool) -> Result<(), ExecError> {
        let mut files = self.files.lock().unwrap();
        let entry = files.entry(path.to_string()).or_default();
        if !append {
            entry.clear();
        }
        entry.extend_from_slice(content);
        Ok(())
    }
}
