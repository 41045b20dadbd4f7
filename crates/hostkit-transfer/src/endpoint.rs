//! `user@host:path` formatting

use std::net::IpAddr;

/// One side of a transfer
///
/// An empty host means the side is the acting host itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub user: String,
    pub host: String,
}

impl Location {
    /// The acting host
    #[must_use]
    pub fn here() -> Self {
        Self::default()
    }

    pub fn remote(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        !self.host.is_empty()
    }

    /// Argument naming `path` on this side
    #[must_use]
    pub fn format(&self, path: &str) -> String {
        format_ssh_arg(&self.user, &self.host, path)
    }

    /// Destination argument for `ssh`, empty for the acting host
    #[must_use]
    pub fn ssh_target(&self) -> String {
        format_ssh_arg(&self.user, &self.host, "")
    }
}

/// Format a copy argument
///
/// The user is kept only when a host is set, and the `:` separator only when
/// both host and path are set.
#[must_use]
pub fn format_ssh_arg(user: &str, host: &str, path: &str) -> String {
    let mut arg = String::new();
    if !user.is_empty() && !host.is_empty() {
        arg.push_str(user);
        arg.push('@');
    }
    arg.push_str(host);
    if !path.is_empty() {
        if !host.is_empty() {
            arg.push(':');
        }
        arg.push_str(path);
    }
    arg
}

/// Host part for an address; IPv6 is bracketed so the `:` separator stays unambiguous
#[must_use]
pub fn host_for(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}
