//! Remote command execution using russh crate

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::client::{self, Msg};
use russh::keys::{PrivateKeyWithHashAlg, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect, Limits};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::command::FormattedCommand;
use crate::controls::{Controls, HostState};
use crate::error::ExecError;
use crate::interactive;
use crate::keys::{self, KeySource, ResolvedKey};
use crate::resolve::{NetworkIdentity, Resolver, SystemResolver};
use crate::result::{RawOutput, UNKNOWN_STATUS};
use crate::traits::{Endpoint, Host, HostKind};

/// Channel window requested from the server
const TRANSPORT_WINDOW: u32 = 2_147_483_647;
/// Bytes exchanged before rekeying
const REKEY_LIMIT: usize = 1 << 30;
/// Time before rekeying
const REKEY_TIME: Duration = Duration::from_secs(3600);

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler {
    forward_agent: bool,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        Ok(true)
    }

    async fn server_channel_open_agent_forward(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        if !self.forward_agent {
            debug!("refusing agent channel, forwarding disabled");
            return Ok(());
        }
        let Some(socket) = std::env::var_os("SSH_AUTH_SOCK") else {
            warn!("agent channel opened but SSH_AUTH_SOCK is not set");
            return Ok(());
        };

        tokio::spawn(async move {
            match UnixStream::connect(&socket).await {
                Ok(mut agent) => {
                    let mut remote = channel.into_stream();
                    if let Err(e) = tokio::io::copy_bidirectional(&mut remote, &mut agent).await {
                        debug!(error = %e, "agent forwarding ended");
                    }
                }
                Err(e) => warn!(error = %e, "unable to reach local SSH agent"),
            }
        });
        Ok(())
    }
}

/// Options for [`RemoteHost::connect`]
#[derive(Clone)]
pub struct ConnectOptions {
    /// Principal to authenticate as
    pub username: String,
    /// Password; when set, only password authentication is attempted
    pub password: Option<String>,
    /// Key to authenticate with; agent and default identities when unset
    pub key: Option<KeySource>,
    /// Passphrase for encrypted keys
    pub passphrase: Option<String>,
    /// Bridge agent channels to the local `SSH_AUTH_SOCK`
    pub forward_agent: bool,
    /// Deadline for connecting and authenticating
    pub timeout: Duration,
    /// Connect over IPv6 when an IPv6 address resolved
    pub ipv6: bool,
    pub port: u16,
    /// Keepalive interval
    pub keepalive: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            password: None,
            key: None,
            passphrase: None,
            forward_agent: true,
            timeout: Duration::from_secs(10),
            ipv6: false,
            port: 22,
            keepalive: None,
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key)
            .field("forward_agent", &self.forward_agent)
            .field("timeout", &self.timeout)
            .field("ipv6", &self.ipv6)
            .field("port", &self.port)
            .field("keepalive", &self.keepalive)
            .finish_non_exhaustive()
    }
}

/// One authentication attempt
#[derive(Debug, Clone)]
pub(crate) enum AuthStep {
    Password(String),
    Key(ResolvedKey),
    Agent,
    Identity(PathBuf),
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStep::Password(_) => write!(f, "password"),
            AuthStep::Key(_) => write!(f, "configured key"),
            AuthStep::Agent => write!(f, "agent"),
            AuthStep::Identity(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Authentication attempts for the given options, in order
pub(crate) fn auth_plan(options: &ConnectOptions) -> Result<Vec<AuthStep>, ExecError> {
    if let Some(password) = &options.password {
        return Ok(vec![AuthStep::Password(password.clone())]);
    }
    if let Some(source) = &options.key {
        let resolved = source
            .resolve()
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;
        let step = if resolved.use_agent() {
            AuthStep::Agent
        } else {
            AuthStep::Key(resolved)
        };
        return Ok(vec![step]);
    }

    let mut plan = vec![AuthStep::Agent];
    plan.extend(keys::default_identities().into_iter().map(AuthStep::Identity));
    Ok(plan)
}

async fn authenticate_key(
    handle: &mut client::Handle<SshClientHandler>,
    username: &str,
    key: &ResolvedKey,
    passphrase: Option<&str>,
) -> Result<bool, ExecError> {
    let Some(key_pair) = key
        .load(passphrase)
        .map_err(|e| ExecError::SshKeyError(e.to_string()))?
    else {
        return Ok(false);
    };
    let hash_alg = handle
        .best_supported_rsa_hash()
        .await
        .ok()
        .flatten()
        .flatten();
    let auth_res = handle
        .authenticate_publickey(
            username,
            PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
        )
        .await
        .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;
    Ok(auth_res.success())
}

async fn authenticate_agent(
    handle: &mut client::Handle<SshClientHandler>,
    username: &str,
) -> Result<bool, ExecError> {
    let mut agent = russh::keys::agent::client::AgentClient::connect_env()
        .await
        .map_err(|e| ExecError::AuthenticationFailed(format!("agent unavailable: {e}")))?;
    let identities = agent
        .request_identities()
        .await
        .map_err(|e| ExecError::AuthenticationFailed(format!("agent identities: {e}")))?;

    for identity in identities {
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let result = handle
            .authenticate_publickey_with(username, identity.clone(), hash_alg, &mut agent)
            .await;
        if let Ok(auth_result) = result {
            if auth_result.success() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

async fn authenticate(
    handle: &mut client::Handle<SshClientHandler>,
    options: &ConnectOptions,
    plan: &[AuthStep],
) -> Result<(), ExecError> {
    let username = options.username.as_str();
    let passphrase = options.passphrase.as_deref();
    let mut failures = Vec::new();

    for step in plan {
        let attempt = match step {
            AuthStep::Password(password) => handle
                .authenticate_password(username, password)
                .await
                .map(|res| res.success())
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string())),
            AuthStep::Key(key) => authenticate_key(handle, username, key, passphrase).await,
            AuthStep::Agent => authenticate_agent(handle, username).await,
            AuthStep::Identity(path) => {
                let key = ResolvedKey::Path(path.clone());
                authenticate_key(handle, username, &key, passphrase).await
            }
        };
        match attempt {
            Ok(true) => {
                debug!(method = %step, "authenticated");
                return Ok(());
            }
            Ok(false) => failures.push(format!("{step}: rejected")),
            Err(e) => failures.push(format!("{step}: {e}")),
        }
    }

    if failures.is_empty() {
        return Err(ExecError::AuthenticationFailed(
            "no authentication method available".to_string(),
        ));
    }
    Err(ExecError::AuthenticationFailed(failures.join("; ")))
}

fn client_config(options: &ConnectOptions) -> client::Config {
    client::Config {
        window_size: TRANSPORT_WINDOW,
        limits: Limits::new(REKEY_LIMIT, REKEY_LIMIT, REKEY_TIME),
        keepalive_interval: options.keepalive,
        ..Default::default()
    }
}

/// Details of the live connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    /// Identity resolved at connect time
    pub identity: NetworkIdentity,
    /// Authenticated principal
    pub user: String,
    /// Effective address
    pub address: IpAddr,
    pub port: u16,
    pub forward_agent: bool,
}

struct Session {
    handle: client::Handle<SshClientHandler>,
    info: ConnectionInfo,
}

fn live(session: &Option<Session>) -> Result<&Session, ExecError> {
    match session {
        Some(session) if !session.handle.is_closed() => Ok(session),
        _ => Err(ExecError::NotConnected),
    }
}

/// A machine reached over SSH
///
/// Nothing runs until [`connect`](RemoteHost::connect) succeeds; every
/// execution and file primitive afterwards opens its own channel on the
/// session.
pub struct RemoteHost {
    state: HostState,
    resolver: Arc<dyn Resolver>,
    session: Mutex<Option<Session>>,
    info: std::sync::Mutex<Option<ConnectionInfo>>,
}

impl fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHost")
            .field("state", &self.state)
            .field("connection", &self.connection_info())
            .finish_non_exhaustive()
    }
}

impl Default for RemoteHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteHost {
    /// Create an unconnected remote host with default controls
    #[must_use]
    pub fn new() -> Self {
        Self::with_controls(Controls::default())
    }

    /// Create an unconnected remote host with the given controls
    #[must_use]
    pub fn with_controls(controls: Controls) -> Self {
        Self {
            state: HostState::new(controls),
            resolver: Arc::new(SystemResolver),
            session: Mutex::new(None),
            info: std::sync::Mutex::new(None),
        }
    }

    /// Use a custom resolver for connect-time lookups
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Details of the live connection, if any
    #[must_use]
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Network identity resolved at connect time
    #[must_use]
    pub fn identity(&self) -> Option<NetworkIdentity> {
        self.connection_info().map(|info| info.identity)
    }

    fn set_info(&self, info: Option<ConnectionInfo>) {
        *self.info.lock().unwrap_or_else(PoisonError::into_inner) = info;
    }

    /// Resolve, connect and authenticate
    ///
    /// A previous session, if any, is closed first.
    ///
    /// # Errors
    /// Returns `ExecError::Unreachable` when no address resolves, and
    /// `ConnectionFailed`/`AuthenticationFailed`/`SshKeyError` when the
    /// session cannot be established.
    #[instrument(skip(self, options), fields(host = %target, user = %options.username))]
    pub async fn connect(&self, target: &str, options: ConnectOptions) -> Result<(), ExecError> {
        let identity = NetworkIdentity::resolve(self.resolver.as_ref(), target).await;
        let address = identity.connect_address(target, options.ipv6)?;
        let plan = auth_plan(&options)?;

        let mut session_lock = self.session.lock().await;
        if let Some(previous) = session_lock.take() {
            info!(address = %previous.info.address, "replacing existing session");
            if let Err(e) = previous
                .handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
            {
                debug!(error = %e, "previous session did not close cleanly");
            }
            self.set_info(None);
        }

        info!(
            address = %address,
            port = options.port,
            identity = %identity,
            "connecting to SSH"
        );

        let config = Arc::new(client_config(&options));
        let handler = SshClientHandler {
            forward_agent: options.forward_agent,
        };
        let establish = async {
            let mut handle = client::connect(config, (address, options.port), handler)
                .await
                .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;
            authenticate(&mut handle, &options, &plan).await?;
            Ok::<_, ExecError>(handle)
        };
        let handle = match timeout(options.timeout, establish).await {
            Ok(handle) => handle?,
            Err(_) => {
                return Err(ExecError::ConnectionFailed(format!(
                    "timed out after {:?} connecting to {address}",
                    options.timeout
                )));
            }
        };

        let info = ConnectionInfo {
            identity,
            user: options.username.clone(),
            address,
            port: options.port,
            forward_agent: options.forward_agent,
        };
        info!(address = %address, "SSH connected and authenticated");
        self.set_info(Some(info.clone()));
        *session_lock = Some(Session { handle, info });
        Ok(())
    }

    /// Whether a live session exists
    pub async fn is_connected(&self) -> bool {
        live(&*self.session.lock().await).is_ok()
    }

    /// Close the session
    ///
    /// Disconnecting twice is a caller error; the second call only logs a
    /// warning.
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if disconnection fails
    pub async fn disconnect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        let Some(session) = session_lock.take() else {
            warn!("disconnect called without a session");
            return Ok(());
        };
        self.set_info(None);
        session
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        info!(address = %session.info.address, "SSH disconnected");
        Ok(())
    }

    /// Connect, run `work` against the host, then always disconnect
    ///
    /// # Errors
    /// Returns the connect error; errors of `work` are part of `T`.
    pub async fn session<T>(
        target: &str,
        options: ConnectOptions,
        work: impl AsyncFnOnce(&RemoteHost) -> T,
    ) -> Result<T, ExecError> {
        let host = RemoteHost::new();
        host.connect(target, options).await?;
        let output = work(&host).await;
        if let Err(e) = host.disconnect().await {
            warn!(error = %e, "disconnect after session failed");
        }
        Ok(output)
    }

    async fn open_channel(&self) -> Result<(Channel<Msg>, bool), ExecError> {
        let session_lock = self.session.lock().await;
        let session = live(&session_lock)?;
        let channel = session
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ExecError::Channel(e.to_string()))?;
        Ok((channel, session.info.forward_agent))
    }

    async fn sftp(&self) -> Result<SftpSession, ExecError> {
        let (channel, _) = self.open_channel().await?;
        channel.request_subsystem(true, "sftp").await?;
        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ExecError::Channel(format!("sftp: {e}")))
    }
}

async fn collect(channel: &mut Channel<Msg>) -> (i32, Vec<u8>, Vec<u8>) {
    let mut status = UNKNOWN_STATUS;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => status = exit_status.cast_signed(),
            _ => {}
        }
    }
    (status, stdout, stderr)
}

fn sftp_error(path: &str, e: impl fmt::Display) -> ExecError {
    ExecError::IoError(format!("{path}: {e}"))
}

#[async_trait]
impl Host for RemoteHost {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn kind(&self) -> HostKind {
        HostKind::Remote
    }

    fn endpoint(&self) -> Option<Endpoint> {
        self.connection_info().map(|info| Endpoint {
            user: info.user,
            address: info.address,
        })
    }

    #[instrument(skip(self, command), fields(command = %command))]
    async fn run(&self, command: &FormattedCommand) -> Result<RawOutput, ExecError> {
        let start = Instant::now();
        let (mut channel, forward_agent) = self.open_channel().await?;

        if command.pty {
            channel
                .request_pty(false, "xterm", 80, 24, 0, 0, &[])
                .await?;
        }
        if forward_agent {
            channel.agent_forward(false).await?;
        }
        channel.exec(true, command.render()).await?;

        if command.interactive {
            let status = interactive::stream(&mut channel).await?;
            return Ok(RawOutput::streamed(status, start.elapsed()));
        }

        channel.eof().await?;
        let (status, stdout, stderr) = collect(&mut channel).await;
        if status == UNKNOWN_STATUS {
            warn!("remote command ended without an exit status");
        }

        Ok(RawOutput {
            status,
            stdout,
            stderr,
            duration: start.elapsed(),
        })
    }

    #[instrument(skip(self))]
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError> {
        let sftp = self.sftp().await?;
        let mut file = sftp
            .open_with_flags(path, OpenFlags::READ)
            .await
            .map_err(|e| sftp_error(path, e))?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(|e| sftp_error(path, e))?;
        if let Err(e) = sftp.close().await {
            debug!(error = %e, "sftp session did not close cleanly");
        }
        Ok(content)
    }

    #[instrument(skip(self, content), fields(len = content.len()))]
    async fn write_file(&self, path: &str, content: &[u8], append: bool) -> Result<(), ExecError> {
        let sftp = self.sftp().await?;
        let mode = if append {
            OpenFlags::APPEND
        } else {
            OpenFlags::TRUNCATE
        };
        let mut file = sftp
            .open_with_flags(path, OpenFlags::CREATE | OpenFlags::WRITE | mode)
            .await
            .map_err(|e| sftp_error(path, e))?;
        file.write_all(content)
            .await
            .map_err(|e| sftp_error(path, e))?;
        file.shutdown().await.map_err(|e| sftp_error(path, e))?;
        if let Err(e) = sftp.close().await {
            debug!(error = %e, "sftp session did not close cleanly");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::resolve::tests::StaticResolver;

    #[test]
    fn test_default_options() {
        let options = ConnectOptions::default();

        assert_eq!(options.username, "root");
        assert_eq!(options.port, 22);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert!(options.forward_agent);
        assert!(!options.ipv6);
    }

    #[test]
    fn test_password_forces_password_only_plan() {
        let options = ConnectOptions {
            password: Some("hunter2".into()),
            key: Some(KeySource::Agent),
            ..ConnectOptions::default()
        };

        for _ in 0..2 {
            let plan = auth_plan(&options).unwrap();
            assert_eq!(plan.len(), 1);
            assert!(matches!(&plan[0], AuthStep::Password(p) if p == "hunter2"));
        }
    }

    #[test]
    fn test_configured_agent_source() {
        let options = ConnectOptions {
            key: Some(KeySource::Agent),
            ..ConnectOptions::default()
        };

        let plan = auth_plan(&options).unwrap();
        assert!(matches!(plan.as_slice(), [AuthStep::Agent]));
    }

    #[test]
    fn test_fallback_plan_starts_with_agent() {
        let plan = auth_plan(&ConnectOptions::default()).unwrap();

        assert!(matches!(plan.first(), Some(AuthStep::Agent)));
        assert!(plan[1..].iter().all(|s| matches!(s, AuthStep::Identity(_))));
    }

    #[test]
    fn test_password_is_redacted() {
        let options = ConnectOptions {
            password: Some("hunter2".into()),
            ..ConnectOptions::default()
        };

        assert!(!format!("{options:?}").contains("hunter2"));
    }

    #[test]
    fn test_transport_tuning() {
        let config = client_config(&ConnectOptions {
            keepalive: Some(Duration::from_secs(30)),
            ..ConnectOptions::default()
        });

        assert_eq!(config.window_size, TRANSPORT_WINDOW);
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_unreachable_target_creates_no_session() {
        let host = RemoteHost::new().with_resolver(Arc::new(StaticResolver::default()));

        let err = host
            .connect("ghost.invalid", ConnectOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::Unreachable(_)));
        assert!(!host.is_connected().await);
        assert!(host.connection_info().is_none());
    }

    #[tokio::test]
    async fn test_execute_requires_connection() {
        let host = RemoteHost::new();

        let err = host.execute(Command::new("true")).await.unwrap_err();
        assert!(matches!(err, ExecError::NotConnected));
        assert_eq!(host.return_code(), -1);

        let err = host.read_file("/etc/hostname").await.unwrap_err();
        assert!(matches!(err, ExecError::NotConnected));
    }

    #[tokio::test]
    async fn test_double_disconnect_is_tolerated() {
        let host = RemoteHost::new();

        assert!(host.disconnect().await.is_ok());
        assert!(host.disconnect().await.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires SSH server"]
    async fn test_ssh_uname() {
        let result = RemoteHost::session("localhost", ConnectOptions::default(), async |host| {
            host.execute(Command::new("uname").opt("s", true)).await
        })
        .await
        .unwrap()
        .unwrap();

        assert!(result.success);
        assert!(!result.stdout.is_empty());
    }
}
