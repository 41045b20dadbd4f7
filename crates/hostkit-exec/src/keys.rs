//! SSH key management and resolution

use std::env;
use std::path::{Path, PathBuf};

use russh::keys::PrivateKey;
use tracing::debug;

/// Identity files tried, in order, when no key source is configured
pub const DEFAULT_IDENTITIES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// SSH key resolution strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Explicit path to key file
    Path(PathBuf),
    /// Use SSH agent
    Agent,
    /// Base64-encoded key from environment
    Env(String),
}

impl KeySource {
    /// Resolve key source to a path, inline key material or the agent
    ///
    /// # Errors
    /// Returns `KeyError` if key resolution fails (env not set, invalid base64, etc.)
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                validate_key_permissions(path)?;
                Ok(ResolvedKey::Path(path.clone()))
            }
            KeySource::Agent => Ok(ResolvedKey::Agent),
            KeySource::Env(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;
                let pem = String::from_utf8(key_data).map_err(|_| KeyError::InvalidBase64)?;
                debug!(var = %var_name, "decoded SSH key from environment");
                Ok(ResolvedKey::Inline(pem))
            }
        }
    }
}

/// Resolved key location
#[derive(Clone)]
pub enum ResolvedKey {
    /// Path to key file
    Path(PathBuf),
    /// Use SSH agent
    Agent,
    /// Key material held in memory
    Inline(String),
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedKey::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ResolvedKey::Agent => write!(f, "Agent"),
            ResolvedKey::Inline(_) => write!(f, "Inline(<redacted>)"),
        }
    }
}

impl ResolvedKey {
    /// Get path for SSH library
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ResolvedKey::Path(p) => Some(p),
            ResolvedKey::Agent | ResolvedKey::Inline(_) => None,
        }
    }

    /// Whether to use SSH agent
    #[must_use]
    pub fn use_agent(&self) -> bool {
        matches!(self, ResolvedKey::Agent)
    }

    /// Load the private key; `None` for the agent
    ///
    /// # Errors
    /// Returns `KeyError::Invalid` if the key cannot be parsed or decrypted
    pub fn load(&self, passphrase: Option<&str>) -> Result<Option<PrivateKey>, KeyError> {
        match self {
            ResolvedKey::Agent => Ok(None),
            ResolvedKey::Path(path) => russh::keys::load_secret_key(path, passphrase)
                .map(Some)
                .map_err(|e| KeyError::Invalid(format!("{}: {e}", path.display()))),
            ResolvedKey::Inline(pem) => russh::keys::decode_secret_key(pem, passphrase)
                .map(Some)
                .map_err(|e| KeyError::Invalid(e.to_string())),
        }
    }
}

/// Existing default identity files under `~/.ssh`
#[must_use]
pub fn default_identities() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    identities_in(&home.join(".ssh"))
}

fn identities_in(dir: &Path) -> Vec<PathBuf> {
    DEFAULT_IDENTITIES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("invalid private key: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();

    // group and other bits must be clear
    if mode & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_path_with_open_permissions_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_test");
        std::fs::write(&key, "not a key").unwrap();
        std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = KeySource::Path(key.clone()).resolve().unwrap_err();
        assert!(matches!(err, KeyError::BadPermissions(_)));

        std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o600)).unwrap();
        let resolved = KeySource::Path(key.clone()).resolve().unwrap();
        assert_eq!(resolved.path(), Some(key.as_path()));
    }

    #[test]
    fn test_missing_env_var() {
        let err = KeySource::Env("HOSTKIT_TEST_KEY_THAT_DOES_NOT_EXIST".into())
            .resolve()
            .unwrap_err();

        assert!(matches!(err, KeyError::EnvNotSet(_)));
    }

    #[test]
    fn test_agent_loads_nothing() {
        let resolved = KeySource::Agent.resolve().unwrap();

        assert!(resolved.use_agent());
        assert!(resolved.load(None).unwrap().is_none());
    }

    #[test]
    fn test_garbage_key_is_invalid() {
        let resolved = ResolvedKey::Inline("-----BEGIN NOTHING-----".into());

        assert!(matches!(resolved.load(None), Err(KeyError::Invalid(_))));
        assert_eq!(format!("{resolved:?}"), "Inline(<redacted>)");
    }

    #[test]
    fn test_default_identity_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("id_rsa"), "").unwrap();
        std::fs::write(dir.path().join("id_ed25519"), "").unwrap();

        let found = identities_in(dir.path());

        assert_eq!(
            found,
            vec![dir.path().join("id_ed25519"), dir.path().join("id_rsa")]
        );
    }
}
