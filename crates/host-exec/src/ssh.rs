//! SSH sessions to remote hosts
//!
//! Both targets the provisioner logs into (the IMC and the freshly installed
//! ACC) are reached on an isolated management network right after a reinstall,
//! so their host keys are new on every run and are accepted without pinning.

use crate::error::ExecError;
use crate::output::CommandOutput;
use crate::runner::CommandRunner;
use russh::ChannelMsg;
use russh::client::{self, Handle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens authenticated command sessions to remote hosts
#[async_trait::async_trait]
pub trait SshConnector: Send + Sync {
    /// Connect to `host` and authenticate with a password
    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn CommandRunner>, ExecError>;
}

struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// `SshConnector` backed by `russh`
#[derive(Debug, Clone)]
pub struct RusshConnector {
    port: u16,
    connect_timeout: Duration,
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self {
            port: DEFAULT_SSH_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[async_trait::async_trait]
impl SshConnector for RusshConnector {
    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn CommandRunner>, ExecError> {
        debug!(host = %host, user = %user, port = self.port, "opening SSH session");

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(300)),
            ..Default::default()
        });

        let connect = client::connect(config, (host, self.port), AcceptAnyHostKey);
        let mut handle = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_elapsed| ExecError::ConnectTimeout {
                host: host.to_string(),
            })?
            .map_err(|source| ExecError::Ssh {
                host: host.to_string(),
                source,
            })?;

        let auth = handle
            .authenticate_password(user, password)
            .await
            .map_err(|source| ExecError::Ssh {
                host: host.to_string(),
                source,
            })?;
        if !auth.success() {
            return Err(ExecError::Authentication {
                host: host.to_string(),
                user: user.to_string(),
            });
        }

        info!(host = %host, user = %user, "SSH session established");
        Ok(Box::new(SshSession {
            host: host.to_string(),
            handle,
        }))
    }
}

/// An authenticated SSH session; each `run` opens a fresh exec channel
pub struct SshSession {
    host: String,
    handle: Handle<AcceptAnyHostKey>,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl SshSession {
    fn ssh_error(&self, source: russh::Error) -> ExecError {
        ExecError::Ssh {
            host: self.host.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError> {
        debug!(host = %self.host, command = %command, "running remote command");

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.ssh_error(e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| self.ssh_error(e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // ext 1 is SSH_EXTENDED_DATA_STDERR
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        let exit_code = exit_status.ok_or_else(|| ExecError::NoExitStatus {
            host: self.host.clone(),
            command: command.to_string(),
        })?;

        Ok(CommandOutput {
            exit_code: i32::try_from(exit_code).unwrap_or(i32::MAX),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}
