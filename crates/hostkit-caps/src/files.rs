//! File commands

use hostkit_exec::{Command, ExecutionResult, Host, Options};
use tracing::{debug, instrument};

use crate::error::CapabilityError;
use crate::path::PathOps;
use crate::support::checked;

/// File operations on a host
pub struct Files<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> Files<'a, H> {
    pub(crate) fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Entries of a directory, hidden ones included
    ///
    /// # Errors
    /// `NotFound` for a missing path, `NotADirectory` for anything else
    /// that is not a directory.
    #[instrument(skip(self))]
    pub async fn listdir(&self, path: &str) -> Result<Vec<String>, CapabilityError> {
        let paths = PathOps::new(self.host);
        if !paths.exists(path).await? {
            return Err(CapabilityError::NotFound(path.to_string()));
        }
        if !paths.is_dir(path).await? {
            return Err(CapabilityError::NotADirectory(path.to_string()));
        }
        let result = checked(
            self.host,
            Command::new("ls").raw_arg("-1").raw_arg("-A").arg(path),
        )
        .await?;
        Ok(result.lines().map(str::to_string).collect())
    }

    /// Create empty files or update their timestamps (`touch`)
    ///
    /// Like every file command below, a non-zero exit is reported in the
    /// result rather than raised.
    pub async fn touch<P: AsRef<str>>(
        &self,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("touch"), paths, options).await
    }

    /// Create directories (`mkdir`); pass `p` for parents
    pub async fn mkdir<P: AsRef<str>>(
        &self,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("mkdir"), paths, options).await
    }

    /// Copy files (`cp`); the last path is the destination
    pub async fn copy<P: AsRef<str>>(
        &self,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("cp"), paths, options).await
    }

    /// Move or rename (`mv`); the last path is the destination
    pub async fn rename<P: AsRef<str>>(
        &self,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("mv"), paths, options).await
    }

    /// Remove files (`rm`); pass `r` and `f` for trees
    pub async fn remove<P: AsRef<str>>(
        &self,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("rm"), paths, options).await
    }

    /// Change permissions, e.g. `0644` or `u+x`
    pub async fn chmod<P: AsRef<str>>(
        &self,
        mode: &str,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("chmod").arg(mode), paths, options).await
    }

    /// Change the owning user
    pub async fn chown<P: AsRef<str>>(
        &self,
        owner: &str,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("chown").arg(owner), paths, options).await
    }

    /// Change the owning group
    pub async fn chgrp<P: AsRef<str>>(
        &self,
        group: &str,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        self.run(Command::new("chgrp").arg(group), paths, options).await
    }

    #[instrument(skip_all, fields(program = %command.program()))]
    async fn run<P: AsRef<str>>(
        &self,
        command: Command,
        paths: &[P],
        options: Options,
    ) -> Result<ExecutionResult, CapabilityError> {
        let result = self.host.execute(command.args(paths).opts(options)).await?;
        if !result.success {
            debug!(status = result.status, stderr = %result.stderr, "file command failed");
        }
        Ok(result)
    }

    /// Whole file content
    pub async fn read(&self, path: &str) -> Result<Vec<u8>, CapabilityError> {
        Ok(self.host.read_file(path).await?)
    }

    /// Whole file content as UTF-8 text
    pub async fn read_to_string(&self, path: &str) -> Result<String, CapabilityError> {
        let content = self.read(path).await?;
        String::from_utf8(content)
            .map_err(|e| CapabilityError::ParseError(format!("{path}: {e}")))
    }

    /// Write a file, replacing it or appending to it
    pub async fn write(&self, path: &str, content: &[u8], append: bool) -> Result<(), CapabilityError> {
        debug!(path = %path, len = content.len(), append, "writing file");
        Ok(self.host.write_file(path, content, append).await?)
    }
}
