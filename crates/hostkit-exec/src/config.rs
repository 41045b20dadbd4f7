//! Configuration types for hosts and their controls

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controls::{Charset, Controls, DEFAULT_LOCALE, OptionsPlacement};
use crate::keys::KeySource;
use crate::ssh::ConnectOptions;

/// Default controls applied to every host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlsConfig {
    /// Value forced into `LC_ALL` (empty disables it)
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Output charset (`utf-8` or `latin-1`)
    #[serde(default)]
    pub decode: Charset,
    /// `before` or `after` positional arguments
    #[serde(default)]
    pub options_placement: OptionsPlacement,
    /// Environment assignments prefixed to every command
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Per-command deadline in seconds
    pub timeout_secs: Option<u64>,
    /// Wrap every command in `sh -c`
    #[serde(default)]
    pub shell: bool,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            decode: Charset::default(),
            options_placement: OptionsPlacement::default(),
            env: BTreeMap::new(),
            timeout_secs: None,
            shell: false,
        }
    }
}

impl From<&ControlsConfig> for Controls {
    fn from(config: &ControlsConfig) -> Self {
        Controls {
            locale: config.locale.clone(),
            decode: config.decode,
            options_placement: config.options_placement,
            env: config.env.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
            shell: config.shell,
        }
    }
}

/// SSH connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// SSH user (defaults to root)
    #[serde(default = "default_user")]
    pub user: String,
    /// Password; disables key and agent authentication when set
    pub password: Option<String>,
    /// Path to SSH private key (optional, falls back to ssh-agent)
    pub ssh_key: Option<PathBuf>,
    /// Environment variable holding a base64-encoded private key
    pub key_env: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prefer IPv6 when the host has an IPv6 address
    #[serde(default)]
    pub ipv6: bool,
    #[serde(default = "default_forward_agent")]
    pub forward_agent: bool,
    /// Connect and authentication deadline
    #[serde(default = "default_connect_timeout")]
    pub timeout_secs: u64,
    /// Keepalive interval (disabled when unset)
    pub keepalive_secs: Option<u64>,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_forward_agent() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            password: None,
            ssh_key: None,
            key_env: None,
            port: default_port(),
            ipv6: false,
            forward_agent: default_forward_agent(),
            timeout_secs: default_connect_timeout(),
            keepalive_secs: None,
        }
    }
}

impl ConnectConfig {
    /// Key source named by the config, if any
    ///
    /// An explicit key path wins over `key_env`.
    #[must_use]
    pub fn key_source(&self) -> Option<KeySource> {
        match (&self.ssh_key, &self.key_env) {
            (Some(path), _) => Some(KeySource::Path(path.clone())),
            (None, Some(var)) => Some(KeySource::Env(var.clone())),
            (None, None) => None,
        }
    }
}

impl From<&ConnectConfig> for ConnectOptions {
    fn from(config: &ConnectConfig) -> Self {
        ConnectOptions {
            username: config.user.clone(),
            password: config.password.clone(),
            key: config.key_source(),
            passphrase: None,
            forward_agent: config.forward_agent,
            timeout: Duration::from_secs(config.timeout_secs),
            ipv6: config.ipv6,
            port: config.port,
            keepalive: config.keepalive_secs.map(Duration::from_secs),
        }
    }
}

/// Configuration for a single named host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique name used to select the host
    pub name: String,
    /// IP address or hostname for SSH connection
    pub addr: String,
    #[serde(flatten)]
    pub connect: ConnectConfig,
    /// Host-specific controls, overriding the global ones
    pub controls: Option<ControlsConfig>,
}
