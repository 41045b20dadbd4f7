//! Host selection

use eyre::WrapErr;
use hostkit_exec::{ConnectConfig, ConnectOptions, Host, LocalHost, RemoteHost};
use tracing::{info, warn};

use crate::config::Config;

/// Name that selects the local machine
pub const LOCAL: &str = "local";

/// Where the subcommand runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<'a> {
    Local,
    /// A `[[host]]` entry of the config
    Named(&'a hostkit_exec::HostConfig),
    /// An address or name not in the config, with default connect settings
    Address(&'a str),
}

/// Decide what `--host` refers to
#[must_use]
pub fn select<'a>(config: &'a Config, host: Option<&'a str>) -> Selection<'a> {
    match host {
        None | Some(LOCAL) => Selection::Local,
        Some(name) => match config.find_host(name) {
            Some(entry) => Selection::Named(entry),
            None => Selection::Address(name),
        },
    }
}

/// An opened host
pub enum Target {
    Local(LocalHost),
    Remote(RemoteHost),
}

impl Target {
    /// Build the selected host, connecting when it is remote
    ///
    /// # Errors
    /// Returns error if the remote host cannot be reached or authenticated
    pub async fn open(config: &Config, host: Option<&str>, user: Option<&str>) -> eyre::Result<Self> {
        let (target, mut connect, controls) = match select(config, host) {
            Selection::Local => {
                return Ok(Target::Local(LocalHost::with_controls(
                    config.controls_for(None),
                )));
            }
            Selection::Named(entry) => (
                entry.addr.as_str(),
                entry.connect.clone(),
                config.controls_for(Some(entry)),
            ),
            Selection::Address(address) => {
                (address, ConnectConfig::default(), config.controls_for(None))
            }
        };
        if let Some(user) = user {
            connect.user = user.to_string();
        }

        let remote = RemoteHost::with_controls(controls);
        remote
            .connect(target, ConnectOptions::from(&connect))
            .await
            .wrap_err_with(|| format!("connecting to {target}"))?;
        if let Some(info) = remote.connection_info() {
            info!(identity = %info.identity, user = %info.user, "connected");
        }
        Ok(Target::Remote(remote))
    }

    pub fn host(&self) -> &dyn Host {
        match self {
            Target::Local(local) => local,
            Target::Remote(remote) => remote,
        }
    }

    /// Disconnect a remote host
    pub async fn close(self) {
        if let Target::Remote(remote) = self {
            if let Err(e) = remote.disconnect().await {
                warn!(error = %e, "disconnect failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        toml::from_str(
            r#"
            [[host]]
            name = "db"
            addr = "10.0.0.5"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_select() {
        let config = config();

        assert_eq!(select(&config, None), Selection::Local);
        assert_eq!(select(&config, Some("local")), Selection::Local);
        assert!(matches!(select(&config, Some("db")), Selection::Named(h) if h.addr == "10.0.0.5"));
        assert_eq!(select(&config, Some("10.9.9.9")), Selection::Address("10.9.9.9"));
    }

    #[tokio::test]
    async fn test_local_target_uses_global_controls() {
        let mut config = config();
        config.controls.locale = "C".to_string();

        let target = Target::open(&config, None, None).await.unwrap();

        assert_eq!(target.host().controls().locale, "C");
        assert_eq!(target.host().executor_type(), "local");
        target.close().await;
    }
}
