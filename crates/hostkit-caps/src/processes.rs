//! Process signaling

use std::fmt;

use hostkit_exec::{Command, ExecutionResult, Host};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::CapabilityError;

/// Signal to send, by number or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signal {
    Number(i32),
    Name(String),
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Number(15)
    }
}

impl From<i32> for Signal {
    fn from(number: i32) -> Self {
        Signal::Number(number)
    }
}

impl From<&str> for Signal {
    fn from(name: &str) -> Self {
        match name.parse() {
            Ok(number) => Signal::Number(number),
            Err(_) => Signal::Name(name.trim_start_matches("SIG").to_string()),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Number(number) => write!(f, "{number}"),
            Signal::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Process operations on a host
pub struct Processes<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> Processes<'a, H> {
    pub(crate) fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Send a signal to a process (`kill -s <signal> <pid>`)
    #[instrument(skip(self))]
    pub async fn kill(&self, pid: u32, signal: Signal) -> Result<ExecutionResult, CapabilityError> {
        let command = Command::new("kill")
            .raw_arg("-s")
            .arg(signal.to_string())
            .arg(pid.to_string());
        Ok(self.host.execute(command).await?)
    }

    /// Send the default signal (15)
    pub async fn terminate(&self, pid: u32) -> Result<ExecutionResult, CapabilityError> {
        self.kill(pid, Signal::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_parsing() {
        assert_eq!(Signal::from("9"), Signal::Number(9));
        assert_eq!(Signal::from("SIGHUP"), Signal::Name("HUP".into()));
        assert_eq!(Signal::from("TERM").to_string(), "TERM");
        assert_eq!(Signal::default().to_string(), "15");
    }
}
