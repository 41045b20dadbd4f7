//! Configuration loading and types

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use hostkit_exec::{Controls, ControlsConfig, HostConfig};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "HOSTKIT_CONFIG";

/// Top-level configuration for the hostkit binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    /// Controls for every host without its own
    #[serde(default)]
    pub controls: ControlsConfig,
    /// Named remote hosts
    #[serde(default)]
    pub host: Vec<HostConfig>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        for path in default_paths() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Configured host with this name
    #[must_use]
    pub fn find_host(&self, name: &str) -> Option<&HostConfig> {
        self.host.iter().find(|host| host.name == name)
    }

    /// Controls for a host: its own section when present, else the global one
    #[must_use]
    pub fn controls_for(&self, host: Option<&HostConfig>) -> Controls {
        let section = host
            .and_then(|h| h.controls.as_ref())
            .unwrap_or(&self.controls);
        Controls::from(section)
    }

    fn validate(&self) -> eyre::Result<()> {
        for (index, host) in self.host.iter().enumerate() {
            if self.host[..index].iter().any(|h| h.name == host.name) {
                eyre::bail!("duplicate host name '{}'", host.name);
            }
        }
        Ok(())
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("hostkit.toml"),
        PathBuf::from("/etc/hostkit/hostkit.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("hostkit/hostkit.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostkit_exec::OptionsPlacement;

    const SAMPLE: &str = r#"
        [log]
        level = "debug"

        [controls]
        options_placement = "after"

        [[host]]
        name = "db"
        addr = "10.0.0.5"
        user = "admin"

        [[host]]
        name = "legacy"
        addr = "legacy.example.net"

        [host.controls]
        decode = "latin-1"
        locale = ""
    "#;

    #[test]
    fn test_parse_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.log.level, "debug");
        assert!(!config.log.json);
        assert_eq!(config.host.len(), 2);
        assert_eq!(config.find_host("db").unwrap().connect.user, "admin");
        assert!(config.find_host("web").is_none());
    }

    #[test]
    fn test_host_controls_replace_global_ones() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        let global = config.controls_for(None);
        assert_eq!(global.options_placement, OptionsPlacement::After);

        let db = config.controls_for(config.find_host("db"));
        assert_eq!(db, global);

        let legacy = config.controls_for(config.find_host("legacy"));
        assert_eq!(legacy.locale, "");
        assert_eq!(legacy.options_placement, OptionsPlacement::Before);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.log.level, "warn");
        assert!(config.host.is_empty());
        assert_eq!(config.controls_for(None), Controls::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostkit.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.host[0].addr, "10.0.0.5");
    }

    #[test]
    fn test_load_reports_path() {
        let err = Config::load(Path::new("/nonexistent/hostkit.toml")).unwrap_err();

        assert!(format!("{err:?}").contains("/nonexistent/hostkit.toml"));
    }

    #[test]
    fn test_duplicate_host_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostkit.toml");
        std::fs::write(
            &path,
            r#"
            [[host]]
            name = "db"
            addr = "10.0.0.5"

            [[host]]
            name = "db"
            addr = "10.0.0.6"
            "#,
        )
        .unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate host name 'db'"));
    }
}
