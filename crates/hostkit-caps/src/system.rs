//! System facts

use hostkit_exec::{Command, Host};

use crate::error::CapabilityError;
use crate::support::{checked, text};

/// System queries on a host
pub struct System<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> System<'a, H> {
    pub(crate) fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Kernel name, lower-cased (`linux`, `darwin`, ...)
    pub async fn os_type(&self) -> Result<String, CapabilityError> {
        let result = checked(self.host, Command::new("uname").opt("s", true)).await?;
        Ok(result.stdout.to_lowercase())
    }

    /// Machine hardware name (`x86_64`, `aarch64`, ...)
    pub async fn arch(&self) -> Result<String, CapabilityError> {
        let result = checked(self.host, Command::new("uname").opt("m", true)).await?;
        Ok(result.stdout)
    }

    pub async fn hostname(&self) -> Result<String, CapabilityError> {
        let result = checked(self.host, Command::new("hostname")).await?;
        Ok(result.stdout)
    }

    /// Full path of a program, `None` when it is not on the `PATH`
    pub async fn which(&self, program: &str) -> Result<Option<String>, CapabilityError> {
        let result = text(self.host, Command::new("which").arg(program)).await?;
        if result.success && !result.stdout.is_empty() {
            Ok(result.lines().next().map(str::to_string))
        } else {
            Ok(None)
        }
    }

    /// Login the commands run as
    pub async fn username(&self) -> Result<String, CapabilityError> {
        let result = checked(
            self.host,
            Command::new("id").opt("u", true).opt("n", true),
        )
        .await?;
        Ok(result.stdout)
    }

    /// Whether the commands run as uid 0
    pub async fn is_root(&self) -> Result<bool, CapabilityError> {
        let result = checked(self.host, Command::new("id").opt("u", true)).await?;
        Ok(result.stdout.trim() == "0")
    }
}
