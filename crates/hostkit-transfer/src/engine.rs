//! `get` and `put` dispatch

use hostkit_exec::{
    Command, ExecError, ExecutionResult, Host, HostKind, LocalHost, OptionValue, Options,
};
use tracing::{info, instrument, warn};

use crate::endpoint::{Location, host_for};
use crate::error::TransferError;
use crate::method::TransferMethod;
use crate::strategy::{self, TarSides};

/// User assumed on the far side when none is given
pub const DEFAULT_REMOTE_USER: &str = "root";

/// Host name that makes a remote acting host copy from or to the caller's machine
pub const LOCALHOST: &str = "localhost";

/// How to run a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Strategy name, checked at dispatch time
    pub method: String,
    /// User on the far side; `root` unless set
    pub rmtuser: Option<String>,
    /// Stream the copy command's output to the terminal
    pub interactive: bool,
    /// Options of the copy command (both sides for `tar`)
    pub options: Options,
    /// `tar` options for the archiving side
    pub src_opts: Options,
    /// `tar` options for the extracting side
    pub dst_opts: Options,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            method: TransferMethod::default().to_string(),
            rmtuser: None,
            interactive: false,
            options: Options::new(),
            src_opts: Options::new(),
            dst_opts: Options::new(),
        }
    }
}

impl TransferOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn rmtuser(mut self, user: impl Into<String>) -> Self {
        self.rmtuser = Some(user.into());
        self
    }

    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    #[must_use]
    pub fn opt(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.set(name, value);
        self
    }

    #[must_use]
    pub fn src_opt(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.src_opts.set(name, value);
        self
    }

    #[must_use]
    pub fn dst_opt(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.dst_opts.set(name, value);
        self
    }
}

/// A copy command and the machine that runs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub method: TransferMethod,
    /// Run on the caller's machine instead of the acting host
    pub on_local: bool,
    pub src: Location,
    pub src_path: String,
    pub dst: Location,
    pub dst_path: String,
    pub command: Command,
}

/// File transfers run by a host
pub struct Transfer<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: Host + ?Sized> Transfer<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Copy `rmtpath` on `rmthost` to `localpath` on the acting host
    ///
    /// A failed copy, including an unknown method, is an unsuccessful
    /// result rather than an error.
    ///
    /// # Errors
    /// `InvalidOption` for malformed scp options, `Exec` when the acting host
    /// cannot run the command.
    #[instrument(skip(self, opts), fields(method = %opts.method))]
    pub async fn get(
        &self,
        rmthost: &str,
        rmtpath: &str,
        localpath: &str,
        opts: TransferOptions,
    ) -> Result<ExecutionResult, TransferError> {
        let plan = self.plan_get(rmthost, rmtpath, localpath, opts);
        self.run(plan).await
    }

    /// Copy `localpath` on the acting host to `rmtpath` on `rmthost`
    ///
    /// # Errors
    /// Same as [`Transfer::get`].
    #[instrument(skip(self, opts), fields(method = %opts.method))]
    pub async fn put(
        &self,
        localpath: &str,
        rmthost: &str,
        rmtpath: &str,
        opts: TransferOptions,
    ) -> Result<ExecutionResult, TransferError> {
        let plan = self.plan_put(localpath, rmthost, rmtpath, opts);
        self.run(plan).await
    }

    /// The command [`Transfer::get`] would run, without running it
    ///
    /// # Errors
    /// `UnknownMethod`, `InvalidOption`, or `Exec(NotConnected)` when a
    /// remote acting host without a session is asked for `localhost`.
    pub fn plan_get(
        &self,
        rmthost: &str,
        rmtpath: &str,
        localpath: &str,
        opts: TransferOptions,
    ) -> Result<TransferPlan, TransferError> {
        let method = opts.method.parse::<TransferMethod>()?;
        match self.mirrored(rmthost, &opts)? {
            Some(acting) => {
                info!(address = %acting.host, "copying from the local machine to the acting host");
                self.plan(method, true, Location::here(), rmtpath, acting, localpath, opts)
            }
            None => {
                let far = far_side(rmthost, &opts);
                self.plan(method, false, far, rmtpath, Location::here(), localpath, opts)
            }
        }
    }

    /// The command [`Transfer::put`] would run, without running it
    ///
    /// # Errors
    /// Same as [`Transfer::plan_get`].
    pub fn plan_put(
        &self,
        localpath: &str,
        rmthost: &str,
        rmtpath: &str,
        opts: TransferOptions,
    ) -> Result<TransferPlan, TransferError> {
        let method = opts.method.parse::<TransferMethod>()?;
        match self.mirrored(rmthost, &opts)? {
            Some(acting) => {
                info!(address = %acting.host, "copying from the acting host to the local machine");
                self.plan(method, true, acting, localpath, Location::here(), rmtpath, opts)
            }
            None => {
                let far = far_side(rmthost, &opts);
                self.plan(method, false, Location::here(), localpath, far, rmtpath, opts)
            }
        }
    }

    /// The acting host seen from the local machine, when a remote host is
    /// asked to copy from or to `localhost`
    fn mirrored(
        &self,
        rmthost: &str,
        opts: &TransferOptions,
    ) -> Result<Option<Location>, TransferError> {
        if self.host.kind() != HostKind::Remote || rmthost != LOCALHOST {
            return Ok(None);
        }
        let endpoint = self.host.endpoint().ok_or(ExecError::NotConnected)?;
        let user = opts.rmtuser.clone().unwrap_or(endpoint.user);
        Ok(Some(Location::remote(user, host_for(endpoint.address))))
    }

    #[allow(clippy::too_many_arguments)]
    fn plan(
        &self,
        method: TransferMethod,
        on_local: bool,
        src: Location,
        src_path: &str,
        dst: Location,
        dst_path: &str,
        opts: TransferOptions,
    ) -> Result<TransferPlan, TransferError> {
        let command = match method {
            TransferMethod::Scp => strategy::scp(&src, src_path, &dst, dst_path, opts.options)?,
            TransferMethod::Rsync => strategy::rsync(&src, src_path, &dst, dst_path, opts.options),
            TransferMethod::Tar => strategy::tar(
                &src,
                src_path,
                &dst,
                dst_path,
                TarSides {
                    common: opts.options,
                    src: opts.src_opts,
                    dst: opts.dst_opts,
                },
                self.host.controls().options_placement,
            ),
        }
        .interactive(opts.interactive);

        Ok(TransferPlan {
            method,
            on_local,
            src,
            src_path: src_path.to_string(),
            dst,
            dst_path: dst_path.to_string(),
            command,
        })
    }

    async fn run(
        &self,
        plan: Result<TransferPlan, TransferError>,
    ) -> Result<ExecutionResult, TransferError> {
        let plan = match plan {
            Ok(plan) => plan,
            Err(e @ TransferError::UnknownMethod(_)) => {
                warn!(error = %e, "unknown copy method");
                return Ok(ExecutionResult::failure(e.to_string()));
            }
            Err(e) => return Err(e),
        };
        let src = plan.src.format(&plan.src_path);
        let dst = plan.dst.format(&plan.dst_path);

        let result = if plan.on_local {
            LocalHost::with_controls(self.host.controls())
                .execute(plan.command)
                .await?
        } else {
            self.host.execute(plan.command).await?
        };

        if result.success {
            info!(
                method = %plan.method,
                %src,
                %dst,
                duration = ?result.duration,
                "transfer completed"
            );
        } else {
            warn!(
                method = %plan.method,
                status = result.status,
                stderr = %result.stderr,
                "transfer failed"
            );
        }
        Ok(result)
    }
}

fn far_side(rmthost: &str, opts: &TransferOptions) -> Location {
    let user = opts
        .rmtuser
        .clone()
        .unwrap_or_else(|| DEFAULT_REMOTE_USER.to_string());
    Location::remote(user, rmthost)
}

/// File transfers available on any [`Host`]
pub trait TransferExt: Host {
    fn transfer(&self) -> Transfer<'_, Self> {
        Transfer::new(self)
    }
}

impl<H: Host + ?Sized> TransferExt for H {}
