//! Russh-backed transport implementation

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{HashAlg, PublicKey};
use russh::ChannelMsg;
use tracing::{debug, info, warn};

use super::error::SshError;
use super::transport::{AuthAttempt, ExecOutput, Transport, TransportHandle};

/// Client handler for russh callbacks.
///
/// Host keys are trusted on first use: every server key is accepted and its
/// fingerprint logged. Callers that need host verification must layer it on
/// top of this transport.
pub struct ClientHandler {
    host: String,
    port: u16,
}

impl ClientHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        warn!(
            "Auto-accepting host key for {}:{} (fingerprint: {})",
            self.host,
            self.port,
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}

/// Production [`Transport`] built on the russh client.
pub struct RusshTransport {
    timeout: Duration,
}

impl RusshTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RusshTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn TransportHandle>, SshError> {
        let addr = format!("{}:{}", host, port);

        info!("Connecting to SSH server at {}", addr);

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| SshError::ConnectionFailed(format!("Failed to resolve address: {}", e)))?
            .next()
            .ok_or_else(|| SshError::ConnectionFailed("No address found".to_string()))?;

        let config = client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let handler = ClientHandler::new(host.to_string(), port);

        let handle = tokio::time::timeout(
            self.timeout,
            client::connect(Arc::new(config), socket_addr, handler),
        )
        .await
        .map_err(|_| SshError::Timeout("Connection timed out".to_string()))?
        .map_err(|e| SshError::ConnectionFailed(e.to_string()))?;

        debug!("SSH handshake completed");

        Ok(Box::new(RusshHandle {
            handle: Some(handle),
            exec_timeout: self.timeout,
        }))
    }
}

struct RusshHandle {
    handle: Option<client::Handle<ClientHandler>>,
    exec_timeout: Duration,
}

impl RusshHandle {
    fn handle(&mut self) -> Result<&mut client::Handle<ClientHandler>, SshError> {
        self.handle.as_mut().ok_or(SshError::NotConnected)
    }
}

#[async_trait]
impl TransportHandle for RusshHandle {
    async fn authenticate(
        &mut self,
        username: &str,
        auth: AuthAttempt<'_>,
    ) -> Result<bool, SshError> {
        let handle = self.handle()?;

        let authenticated = match auth {
            AuthAttempt::Password(password) => handle
                .authenticate_password(username, password)
                .await
                .map_err(|e| SshError::ConnectionFailed(e.to_string()))?,
            AuthAttempt::Key(key) => {
                let key_with_hash = PrivateKeyWithHashAlg::new(key, None);
                handle
                    .authenticate_publickey(username, key_with_hash)
                    .await
                    .map_err(|e| SshError::ConnectionFailed(e.to_string()))?
            }
        };

        Ok(authenticated.success())
    }

    async fn exec(&mut self, command: &str) -> Result<ExecOutput, SshError> {
        let timeout_duration = self.exec_timeout;
        let handle = self.handle()?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::ChannelError(format!("Failed to open exec channel: {}", e)))?;

        debug!("Remote exec: {}", command);

        channel
            .exec(true, command)
            .await
            .map_err(|e| SshError::ChannelError(format!("Failed to execute command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code: Option<u32> = None;

        let result = tokio::time::timeout(timeout_duration, async {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.extend_from_slice(&data);
                    }
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        // ext=1 is stderr
                        stderr.extend_from_slice(&data);
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        exit_code = Some(exit_status);
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        break;
                    }
                    Some(_other) => {
                        // Ignore other messages (WindowAdjusted, Success, etc.)
                    }
                }
            }
        })
        .await;

        if result.is_err() {
            warn!(
                "Remote command timed out after {:?}: {}",
                timeout_duration, command
            );
            let _ = channel.close().await;
            return Err(SshError::Timeout(format!(
                "Command timed out after {} seconds",
                timeout_duration.as_secs()
            )));
        }

        debug!(
            "Remote exec completed: exit={:?} stdout_len={} stderr_len={}",
            exit_code,
            stdout.len(),
            stderr.len()
        );

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_code,
        })
    }

    async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
                .await;
            debug!("SSH transport disconnected");
        }
    }
}
