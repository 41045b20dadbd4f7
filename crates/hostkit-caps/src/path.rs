//! Path predicates and queries

use hostkit_exec::{Command, Host};
use tracing::{debug, instrument};

use crate::error::CapabilityError;
use crate::support::{checked, predicate, text};

/// Path operations on a host
pub struct PathOps<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> PathOps<'a, H> {
    pub(crate) fn new(host: &'a H) -> Self {
        Self { host }
    }

    async fn test(&self, operator: &str, path: &str) -> Result<bool, CapabilityError> {
        let result = text(
            self.host,
            Command::new("test").raw_arg(operator).arg(path),
        )
        .await?;
        predicate(&result)
    }

    /// Whether the path exists
    ///
    /// `test -e` exiting 1 is a plain "no"; any other failure is an error.
    #[instrument(skip(self))]
    pub async fn exists(&self, path: &str) -> Result<bool, CapabilityError> {
        self.test("-e", path).await
    }

    /// Whether the path is a regular file
    pub async fn is_file(&self, path: &str) -> Result<bool, CapabilityError> {
        self.test("-f", path).await
    }

    /// Whether the path is a directory
    pub async fn is_dir(&self, path: &str) -> Result<bool, CapabilityError> {
        self.test("-d", path).await
    }

    /// Whether the path is a symbolic link
    pub async fn is_symlink(&self, path: &str) -> Result<bool, CapabilityError> {
        self.test("-L", path).await
    }

    /// Description of the file content, as reported by `file`
    ///
    /// `file` reports its errors on stdout, so that is the failure message.
    pub async fn file_type(&self, path: &str) -> Result<String, CapabilityError> {
        let result = text(self.host, Command::new("file").arg(path)).await?;
        if !result.success {
            return Err(CapabilityError::CommandFailed {
                status: result.status,
                message: result.stdout,
            });
        }
        parse_file_type(&result.stdout)
    }

    /// Disk usage in kilobytes
    pub async fn size(&self, path: &str) -> Result<u64, CapabilityError> {
        let result = checked(
            self.host,
            Command::new("du").opt("s", true).opt("k", true).arg(path),
        )
        .await?;
        parse_du(&result.stdout)
    }

    /// Permission string, e.g. `drwxr-xr-x`
    pub async fn permissions(&self, path: &str) -> Result<String, CapabilityError> {
        self.listing_column(path, 0).await
    }

    /// Owning user
    pub async fn owner(&self, path: &str) -> Result<String, CapabilityError> {
        self.listing_column(path, 2).await
    }

    /// Owning group
    pub async fn group(&self, path: &str) -> Result<String, CapabilityError> {
        self.listing_column(path, 3).await
    }

    async fn listing_column(&self, path: &str, column: usize) -> Result<String, CapabilityError> {
        let result = checked(
            self.host,
            Command::new("ls").opt("d", true).opt("l", true).arg(path),
        )
        .await?;
        debug!(listing = %result.stdout, "long listing");
        listing_column(&result.stdout, column)
    }
}

fn parse_file_type(stdout: &str) -> Result<String, CapabilityError> {
    stdout
        .rsplit_once(':')
        .map(|(_, kind)| kind.trim().to_string())
        .ok_or_else(|| CapabilityError::ParseError(format!("unexpected file output: {stdout}")))
}

fn parse_du(stdout: &str) -> Result<u64, CapabilityError> {
    let field = stdout.split('\t').next().unwrap_or_default().trim();
    field
        .parse()
        .map_err(|_| CapabilityError::ParseError(format!("unexpected du output: {stdout}")))
}

fn listing_column(stdout: &str, column: usize) -> Result<String, CapabilityError> {
    stdout
        .split_whitespace()
        .nth(column)
        .map(str::to_string)
        .ok_or_else(|| CapabilityError::ParseError(format!("unexpected ls output: {stdout}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_type_uses_last_colon() {
        assert_eq!(
            parse_file_type("/tmp/a:b.txt: ASCII text").unwrap(),
            "ASCII text"
        );
        assert!(parse_file_type("garbage").is_err());
    }

    #[test]
    fn test_parse_du() {
        assert_eq!(parse_du("128\t/var/log").unwrap(), 128);
        assert!(matches!(
            parse_du("du: cannot access"),
            Err(CapabilityError::ParseError(_))
        ));
    }

    #[test]
    fn test_listing_columns() {
        let line = "-rw-r--r-- 1 root wheel 1024 Jan  1 00:00 /etc/hosts";

        assert_eq!(listing_column(line, 0).unwrap(), "-rw-r--r--");
        assert_eq!(listing_column(line, 2).unwrap(), "root");
        assert_eq!(listing_column(line, 3).unwrap(), "wheel");
        assert!(listing_column("", 3).is_err());
    }
}
