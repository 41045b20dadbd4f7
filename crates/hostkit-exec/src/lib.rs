//! hostkit-exec: Unified command execution
//!
//! Runs shell commands on the local machine or on a remote machine over SSH
//! behind a single [`Host`] trait, with per-host controls (locale, decoding,
//! option placement, environment, timeout) and scoped overrides.

pub mod command;
pub mod config;
pub mod controls;
pub mod error;
mod interactive;
pub mod keys;
pub mod local;
pub mod resolve;
pub mod result;
pub mod ssh;
pub mod traits;

pub use command::{Command, FormattedCommand, OptionValue, Options};
pub use config::{ConnectConfig, ControlsConfig, HostConfig};
pub use controls::{Charset, Controls, ControlsGuard, ControlsOverride, HostState, OptionsPlacement};
pub use error::ExecError;
pub use keys::KeySource;
pub use local::LocalHost;
pub use resolve::{NetworkIdentity, Resolver, SystemResolver};
pub use result::{ExecutionResult, RawOutput};
pub use ssh::{ConnectOptions, RemoteHost};
pub use traits::{Endpoint, Host, HostKind};
