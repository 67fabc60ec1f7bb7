//! SSH Configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Credentials and connection settings for one remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Remote host address
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Authentication secret
    pub auth: AuthMethod,

    /// Connection and command timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Authentication secrets supported
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    /// Password authentication
    Password { password: String },

    /// Private-key authentication
    Key {
        /// Path to private key file
        key_path: String,
    },
}

impl AuthMethod {
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password {
            password: password.into(),
        }
    }

    pub fn key(key_path: impl Into<String>) -> Self {
        Self::Key {
            key_path: key_path.into(),
        }
    }
}

fn default_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    30
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            auth: AuthMethod::Password {
                password: String::new(),
            },
            timeout_secs: 30,
        }
    }
}

/// Expand ~ to home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde(Path::new("~/.ssh/id_rsa"));
        assert!(!path.to_string_lossy().starts_with('~'));

        let absolute = expand_tilde(Path::new("/etc/ssh/key"));
        assert_eq!(absolute, PathBuf::from("/etc/ssh/key"));
    }

    #[test]
    fn test_defaults_applied_on_deserialize() {
        let config: SshConfig = serde_json::from_str(
            r#"{
                "host": "server.example.com",
                "username": "admin",
                "auth": { "type": "password", "password": "hunter2" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 22);
        assert_eq!(config.timeout_secs, 30);
        assert!(matches!(config.auth, AuthMethod::Password { .. }));
    }

    #[test]
    fn test_auth_method_roundtrip() {
        let auth = AuthMethod::key("~/.ssh/id_ed25519");
        let json = serde_json::to_string(&auth).unwrap();
        let back: AuthMethod = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, AuthMethod::Key { key_path } if key_path == "~/.ssh/id_ed25519"));
    }
}
