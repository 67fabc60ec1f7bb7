//! Remote authorized-keys provisioning
//!
//! Pushes a local public key into the remote account's
//! `~/.ssh/authorized_keys` over an authenticated session. The sequence is
//! not transactional: each remote step is gated on the previous one
//! reporting a clean error stream, and a failure aborts the remainder
//! without rollback.

mod orchestrator;

pub use orchestrator::{provision_key_access, ProvisionOutcome};

use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::ssh::{expand_tilde, SshError, SshSession};

/// Default public key uploaded when the caller does not name one.
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "~/.ssh/id_ed25519.pub";

/// The remote mutations applied by [`upload_public_key`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    EnsureSshDir,
    AppendKey,
    HardenPermissions,
}

impl ProvisionStep {
    fn describe(&self) -> &'static str {
        match self {
            ProvisionStep::EnsureSshDir => "creating ~/.ssh",
            ProvisionStep::AppendKey => "appending the public key to authorized_keys",
            ProvisionStep::HardenPermissions => "setting permissions on authorized_keys",
        }
    }
}

const ENSURE_SSH_DIR: &str = "mkdir -p ~/.ssh && chmod 700 ~/.ssh";
const HARDEN_AUTHORIZED_KEYS: &str = "chmod 600 ~/.ssh/authorized_keys";

/// Append the public key at `public_key_path` to the remote account's
/// authorized_keys.
///
/// The append is unconditional: uploading a key that is already present adds
/// a duplicate line.
pub async fn upload_public_key(
    session: &mut SshSession,
    public_key_path: &str,
) -> Result<(), SshError> {
    if !session.is_connected() {
        error!("No active SSH connection, connect before uploading a key");
        return Err(SshError::NotConnected);
    }

    let path = expand_tilde(Path::new(public_key_path));
    if !path.exists() {
        error!("Public key file not found: {}", path.display());
        return Err(SshError::NotFound(path));
    }

    let public_key = fs::read_to_string(&path)?;

    run_step(session, ProvisionStep::EnsureSshDir, ENSURE_SSH_DIR).await?;

    let append = format!(
        "echo '{}' >> ~/.ssh/authorized_keys",
        public_key.trim()
    );
    run_step(session, ProvisionStep::AppendKey, &append).await?;

    run_step(session, ProvisionStep::HardenPermissions, HARDEN_AUTHORIZED_KEYS).await?;

    info!("Uploaded public key to {}", session.host());
    Ok(())
}

async fn run_step(
    session: &mut SshSession,
    step: ProvisionStep,
    command: &str,
) -> Result<(), SshError> {
    let output = session.execute(command).await?;
    if !output.stderr.is_empty() {
        error!(
            "Error while {}: {}",
            step.describe(),
            output.stderr.trim_end()
        );
        return Err(SshError::RemoteCommand {
            step: step.describe(),
            stderr: output.stderr,
        });
    }
    Ok(())
}
