//! SSH Session management
//!
//! A session owns at most one live transport handle and moves between two
//! states; every transition goes through the connect and close methods
//! rather than ad-hoc field mutation.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::config::SshConfig;
use super::error::SshError;
use super::keys::{classify, load_key, KeyType};
use super::transport::{AuthAttempt, ExecOutput, Transport, TransportHandle};

/// How the current connection was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Password,
    Key(KeyType),
}

enum SessionState {
    Disconnected,
    Connected {
        handle: Box<dyn TransportHandle>,
        mode: AuthMode,
    },
}

/// A single logical connection to one remote host.
pub struct SshSession {
    id: String,
    config: SshConfig,
    transport: Arc<dyn Transport>,
    state: SessionState,
}

impl SshSession {
    pub fn new(config: SshConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            transport,
            state: SessionState::Disconnected,
        }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    /// Authentication mode of the live connection, if any.
    pub fn auth_mode(&self) -> Option<AuthMode> {
        match &self.state {
            SessionState::Connected { mode, .. } => Some(*mode),
            SessionState::Disconnected => None,
        }
    }

    /// Connect and authenticate with a password.
    pub async fn connect_with_password(&mut self, password: &str) -> Result<(), SshError> {
        self.connect(AuthAttempt::Password(password), AuthMode::Password)
            .await?;
        info!(
            "Session {} connected to {} with password auth",
            self.id, self.config.host
        );
        Ok(())
    }

    /// Classify the private key at `key_path`, then connect and authenticate
    /// with it.
    ///
    /// No transport is opened when classification fails. Returns the
    /// classified key type on success.
    pub async fn connect_with_key(&mut self, key_path: &str) -> Result<KeyType, SshError> {
        let key_type = classify(Path::new(key_path))?;
        debug!(
            "Session {}: {} classified as {}",
            self.id, key_path, key_type
        );

        // The file can change between classification and load; a missing
        // file here surfaces as its own error.
        let key = load_key(Path::new(key_path))?;

        self.connect(AuthAttempt::Key(Arc::new(key)), AuthMode::Key(key_type))
            .await?;
        info!(
            "Session {} connected to {} with {} key auth",
            self.id, self.config.host, key_type
        );
        Ok(key_type)
    }

    async fn connect(&mut self, auth: AuthAttempt<'_>, mode: AuthMode) -> Result<(), SshError> {
        // One live handle at a time: tear down any existing connection
        // before opening the next one.
        if self.is_connected() {
            debug!(
                "Session {} reconnecting, closing the previous handle",
                self.id
            );
            self.close().await;
        }

        let mut handle = self
            .transport
            .open(&self.config.host, self.config.port)
            .await?;

        let accepted = match handle.authenticate(&self.config.username, auth).await {
            Ok(accepted) => accepted,
            Err(e) => {
                handle.close().await;
                return Err(e);
            }
        };

        if !accepted {
            handle.close().await;
            return Err(SshError::AuthenticationRejected(format!(
                "{}@{} refused the supplied credentials",
                self.config.username, self.config.host
            )));
        }

        self.state = SessionState::Connected { handle, mode };
        Ok(())
    }

    /// Run a command on the remote host over the active connection.
    pub async fn execute(&mut self, command: &str) -> Result<ExecOutput, SshError> {
        match &mut self.state {
            SessionState::Connected { handle, .. } => handle.exec(command).await,
            SessionState::Disconnected => Err(SshError::NotConnected),
        }
    }

    /// Release the transport handle. Calling this twice is safe; the second
    /// call is a no-op.
    pub async fn close(&mut self) {
        if let SessionState::Connected { mut handle, .. } =
            std::mem::replace(&mut self.state, SessionState::Disconnected)
        {
            handle.close().await;
            info!("Session {} to {} closed", self.id, self.config.host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::AuthMethod;
    use crate::testutil::{fixtures, FakeEvent, FakeServer, FakeTransport};
    use tempfile::tempdir;

    fn session_for(server: &Arc<FakeServer>) -> SshSession {
        let config = SshConfig {
            host: "server.example.com".to_string(),
            username: "admin".to_string(),
            auth: AuthMethod::password("hunter2"),
            ..Default::default()
        };
        SshSession::new(config, FakeTransport::new(server.clone()))
    }

    #[tokio::test]
    async fn test_execute_while_disconnected() {
        let server = FakeServer::with_password("admin", "hunter2");
        let mut session = session_for(&server);

        let result = session.execute("true").await;
        assert!(matches!(result, Err(SshError::NotConnected)));
        assert!(server.exec_log().is_empty());
    }

    #[tokio::test]
    async fn test_password_connect_and_close() {
        let server = FakeServer::with_password("admin", "hunter2");
        let mut session = session_for(&server);

        session.connect_with_password("hunter2").await.unwrap();
        assert!(session.is_connected());
        assert_eq!(session.auth_mode(), Some(AuthMode::Password));

        session.close().await;
        session.close().await;
        assert!(!session.is_connected());

        let closes = server
            .events()
            .into_iter()
            .filter(|e| *e == FakeEvent::Close)
            .count();
        assert_eq!(closes, 1, "second close must be a no-op");
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let server = FakeServer::with_password("admin", "hunter2");
        let mut session = session_for(&server);

        let result = session.connect_with_password("wrong").await;
        assert!(matches!(result, Err(SshError::AuthenticationRejected(_))));
        assert!(!session.is_connected());

        // The freshly opened handle is released when the server refuses.
        assert_eq!(
            server.events().last(),
            Some(&FakeEvent::Close),
            "rejected handle must be closed"
        );
    }

    #[tokio::test]
    async fn test_connect_with_key_classifier_failure_opens_nothing() {
        let server = FakeServer::with_password("admin", "hunter2");
        let mut session = session_for(&server);

        let result = session.connect_with_key("/nonexistent/id_ed25519").await;
        assert!(matches!(result, Err(SshError::NotFound(_))));
        assert!(server.events().is_empty(), "no transport may be opened");
    }

    #[tokio::test]
    async fn test_connect_with_key_rejected_by_server() {
        let dir = tempdir().unwrap();
        let key_path = fixtures::write(dir.path(), "id_ed25519", fixtures::ED25519_PRIVATE);

        // The server knows no authorized keys, so the offer is refused.
        let server = FakeServer::with_password("admin", "hunter2");
        let mut session = session_for(&server);

        let result = session
            .connect_with_key(key_path.to_str().unwrap())
            .await;
        assert!(matches!(result, Err(SshError::AuthenticationRejected(_))));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_handle_first() {
        let server = FakeServer::with_password("admin", "hunter2");
        let mut session = session_for(&server);

        session.connect_with_password("hunter2").await.unwrap();
        session.connect_with_password("hunter2").await.unwrap();
        assert!(session.is_connected());

        let events = server.events();
        let expected = [
            FakeEvent::Open,
            FakeEvent::AuthPassword {
                username: "admin".to_string(),
                accepted: true,
            },
            FakeEvent::Close,
            FakeEvent::Open,
            FakeEvent::AuthPassword {
                username: "admin".to_string(),
                accepted: true,
            },
        ];
        assert_eq!(events, expected);
    }
}
