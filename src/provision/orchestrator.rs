//! One-host provisioning flow
//!
//! connect with password → upload the public key → optionally verify
//! key-based login → close. A stage runs only while the previous one
//! succeeded, and the session is closed on every exit path that opened one.

use std::sync::Arc;

use tracing::{error, info};

use crate::ssh::{AuthMethod, KeyType, SshConfig, SshError, SshSession, Transport};

use super::upload_public_key;

/// Result of a completed provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// Classified type of the private key, when key login was verified.
    pub key_type: Option<KeyType>,
}

/// Provision key access to the host described by `config`.
///
/// `config.auth` must carry the password for the initial connection. When
/// `private_key_path` is given, the matching private key is used for a
/// second, key-authenticated connection after the upload, proving the
/// installed key works.
pub async fn provision_key_access(
    transport: Arc<dyn Transport>,
    config: &SshConfig,
    public_key_path: &str,
    private_key_path: Option<&str>,
) -> Result<ProvisionOutcome, SshError> {
    let password = match &config.auth {
        AuthMethod::Password { password } => password.clone(),
        AuthMethod::Key { .. } => {
            return Err(SshError::AuthenticationRejected(
                "provisioning starts from password credentials".to_string(),
            ));
        }
    };

    let mut session = SshSession::new(config.clone(), transport);

    if let Err(e) = session.connect_with_password(&password).await {
        error!("Provisioning {} failed: {}", config.host, e);
        return Err(e);
    }

    let outcome = run_stages(&mut session, public_key_path, private_key_path).await;

    session.close().await;

    match &outcome {
        Ok(o) => info!(
            "Provisioned key access to {} (verified key type: {:?})",
            config.host, o.key_type
        ),
        Err(e) => error!("Provisioning {} failed: {}", config.host, e),
    }

    outcome
}

async fn run_stages(
    session: &mut SshSession,
    public_key_path: &str,
    private_key_path: Option<&str>,
) -> Result<ProvisionOutcome, SshError> {
    upload_public_key(session, public_key_path).await?;

    let key_type = match private_key_path {
        Some(path) => Some(session.connect_with_key(path).await?),
        None => None,
    };

    Ok(ProvisionOutcome { key_type })
}
