//! SSH Error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Key is passphrase-protected: {0} (encrypted keys are not supported)")]
    PassphraseRequired(PathBuf),

    #[error("Unsupported or invalid key format: {0}")]
    UnsupportedKeyFormat(PathBuf),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Remote command failed while {step}: {stderr}")]
    RemoteCommand { step: &'static str, stderr: String },

    #[error("Not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::ConnectionFailed(err.to_string())
    }
}

impl From<russh::keys::Error> for SshError {
    fn from(err: russh::keys::Error) -> Self {
        SshError::KeyError(err.to_string())
    }
}
