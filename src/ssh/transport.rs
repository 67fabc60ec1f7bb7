//! Transport abstraction consumed by the session layer
//!
//! The session logic talks to this small trait surface instead of russh
//! directly, so tests can substitute an in-memory transport that records
//! every call.

use std::sync::Arc;

use async_trait::async_trait;
use russh::keys::PrivateKey;

use super::error::SshError;

/// Output captured from one remote command.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<u32>,
}

/// Credential material for a single authentication attempt.
#[derive(Clone)]
pub enum AuthAttempt<'a> {
    Password(&'a str),
    Key(Arc<PrivateKey>),
}

/// Opens connections to remote hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn TransportHandle>, SshError>;
}

/// One open, possibly-authenticated connection to a remote host.
#[async_trait]
pub trait TransportHandle: Send {
    /// Returns `Ok(true)` if the server accepted the credentials.
    async fn authenticate(
        &mut self,
        username: &str,
        auth: AuthAttempt<'_>,
    ) -> Result<bool, SshError>;

    /// Run a command, capturing its stdout and stderr.
    async fn exec(&mut self, command: &str) -> Result<ExecOutput, SshError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self);
}
