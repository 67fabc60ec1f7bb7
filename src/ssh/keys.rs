//! Private-key classification and loading
//!
//! The legacy PEM encodings of SSH private keys carry no self-describing
//! algorithm tag, so the key type has to be determined empirically: attempt
//! a structured parse per algorithm, in a fixed priority order, and observe
//! which one accepts the file.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use russh::keys::PrivateKey;
use tracing::debug;

use super::config::expand_tilde;
use super::error::SshError;

/// Key algorithm families supported for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Rsa,
    Ed25519,
    Dsa,
    Ecdsa,
}

impl KeyType {
    /// SSH algorithm identifier for this family. ECDSA covers all three
    /// NIST curves, so the curve suffix is omitted.
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            KeyType::Rsa => "ssh-rsa",
            KeyType::Ed25519 => "ssh-ed25519",
            KeyType::Dsa => "ssh-dss",
            KeyType::Ecdsa => "ecdsa-sha2",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.algorithm_name())
    }
}

/// Outcome of one parse attempt against one algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The file is a well-formed, unencrypted key of the attempted type.
    Matched,
    /// The file is not a key of the attempted type.
    FormatMismatch,
    /// The key is encrypted and no passphrase was supplied.
    PassphraseRequired,
}

/// Parse attempts in classification priority order.
const PARSE_ATTEMPTS: &[(KeyType, fn(&str) -> ParseOutcome)] = &[
    (KeyType::Rsa, try_parse_rsa),
    (KeyType::Ed25519, try_parse_ed25519),
    (KeyType::Dsa, try_parse_dsa),
    (KeyType::Ecdsa, try_parse_ecdsa),
];

/// Determine the algorithm family of the private key at `path`.
///
/// Attempts RSA, Ed25519, DSA and ECDSA in that order. A passphrase-protected
/// key aborts the attempt loop immediately: encryption is a property of the
/// file, not of the algorithm being tried. Each call re-reads the file;
/// nothing is cached.
pub fn classify(path: &Path) -> Result<KeyType, SshError> {
    let path = expand_tilde(path);
    let contents = fs::read_to_string(&path).map_err(|_| SshError::NotFound(path.clone()))?;

    for (key_type, attempt) in PARSE_ATTEMPTS {
        match attempt(&contents) {
            ParseOutcome::Matched => {
                debug!("Classified {} as {}", path.display(), key_type);
                return Ok(*key_type);
            }
            ParseOutcome::PassphraseRequired => {
                return Err(SshError::PassphraseRequired(path));
            }
            ParseOutcome::FormatMismatch => continue,
        }
    }

    Err(SshError::UnsupportedKeyFormat(path))
}

/// Load the key material at `path` for authentication.
///
/// Kept separate from [`classify`]: the file can disappear between the two
/// calls, and that race surfaces here as its own not-found error.
pub fn load_key(path: &Path) -> Result<PrivateKey, SshError> {
    let path = expand_tilde(path);
    if !path.exists() {
        return Err(SshError::NotFound(path));
    }

    debug!("Loading key from: {}", path.display());
    russh::keys::load_secret_key(&path, None).map_err(|e| SshError::KeyError(e.to_string()))
}

fn try_parse_rsa(contents: &str) -> ParseOutcome {
    parse_as(contents, KeyType::Rsa)
}

fn try_parse_ed25519(contents: &str) -> ParseOutcome {
    parse_as(contents, KeyType::Ed25519)
}

fn try_parse_dsa(contents: &str) -> ParseOutcome {
    parse_as(contents, KeyType::Dsa)
}

fn try_parse_ecdsa(contents: &str) -> ParseOutcome {
    parse_as(contents, KeyType::Ecdsa)
}

/// One structured parse attempt: does `contents` hold a key of `expected`?
fn parse_as(contents: &str, expected: KeyType) -> ParseOutcome {
    let Some(label) = pem_label(contents) else {
        return ParseOutcome::FormatMismatch;
    };

    match label {
        "OPENSSH PRIVATE KEY" => parse_openssh(contents, expected),
        "ENCRYPTED PRIVATE KEY" => ParseOutcome::PassphraseRequired,
        "PRIVATE KEY" => decoded_family(contents, expected),
        "RSA PRIVATE KEY" | "DSA PRIVATE KEY" | "EC PRIVATE KEY" => {
            parse_legacy_pem(contents, label, expected)
        }
        _ => ParseOutcome::FormatMismatch,
    }
}

/// Legacy OpenSSL PEM: the label names the algorithm directly.
fn parse_legacy_pem(contents: &str, label: &str, expected: KeyType) -> ParseOutcome {
    // OpenSSL puts the encryption headers between the BEGIN marker and the
    // base64 body.
    if contents.contains("Proc-Type: 4,ENCRYPTED") || contents.contains("DEK-Info:") {
        return ParseOutcome::PassphraseRequired;
    }

    let family = match label {
        "RSA PRIVATE KEY" => KeyType::Rsa,
        "DSA PRIVATE KEY" => KeyType::Dsa,
        _ => KeyType::Ecdsa,
    };
    if family != expected {
        return ParseOutcome::FormatMismatch;
    }

    match pem_body(contents) {
        Some(body) if !body.is_empty() => ParseOutcome::Matched,
        _ => ParseOutcome::FormatMismatch,
    }
}

const OPENSSH_MAGIC: &[u8] = b"openssh-key-v1\0";

/// OpenSSH native format: inspect the envelope for the cipher, then decode
/// to learn the algorithm.
fn parse_openssh(contents: &str, expected: KeyType) -> ParseOutcome {
    let Some(blob) = pem_body(contents) else {
        return ParseOutcome::FormatMismatch;
    };
    if !blob.starts_with(OPENSSH_MAGIC) {
        return ParseOutcome::FormatMismatch;
    }

    match openssh_cipher_name(&blob) {
        Some(cipher) if cipher == &b"none"[..] => {}
        Some(_) => return ParseOutcome::PassphraseRequired,
        None => return ParseOutcome::FormatMismatch,
    }

    decoded_family(contents, expected)
}

/// Cipher name field of an `openssh-key-v1` blob: a length-prefixed string
/// directly after the magic.
fn openssh_cipher_name(blob: &[u8]) -> Option<&[u8]> {
    let rest = blob.get(OPENSSH_MAGIC.len()..)?;
    let len = u32::from_be_bytes(rest.get(..4)?.try_into().ok()?) as usize;
    rest.get(4..4 + len)
}

/// Full decode via russh, then compare the algorithm family.
fn decoded_family(contents: &str, expected: KeyType) -> ParseOutcome {
    match russh::keys::decode_secret_key(contents, None) {
        Ok(key) => {
            if algorithm_family(key.algorithm().as_str()) == Some(expected) {
                ParseOutcome::Matched
            } else {
                ParseOutcome::FormatMismatch
            }
        }
        Err(_) => ParseOutcome::FormatMismatch,
    }
}

/// Map an SSH algorithm identifier to its key family.
fn algorithm_family(name: &str) -> Option<KeyType> {
    match name {
        "ssh-ed25519" => Some(KeyType::Ed25519),
        "ssh-rsa" | "rsa-sha2-256" | "rsa-sha2-512" => Some(KeyType::Rsa),
        "ssh-dss" => Some(KeyType::Dsa),
        s if s.starts_with("ecdsa-sha2-") => Some(KeyType::Ecdsa),
        _ => None,
    }
}

/// Label of the first `-----BEGIN <label>-----` line, if any.
fn pem_label(contents: &str) -> Option<&str> {
    let line = contents
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("-----BEGIN "))?;
    line.strip_prefix("-----BEGIN ")?.strip_suffix("-----")
}

/// Base64-decoded payload between the BEGIN/END markers, skipping header
/// lines and blank lines.
fn pem_body(contents: &str) -> Option<Vec<u8>> {
    let mut in_body = false;
    let mut b64 = String::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with("-----BEGIN ") {
            in_body = true;
            continue;
        }
        if line.starts_with("-----END ") {
            break;
        }
        if !in_body || line.is_empty() || line.contains(':') {
            continue;
        }
        b64.push_str(line);
    }

    if !in_body {
        return None;
    }
    BASE64.decode(b64.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixtures;
    use tempfile::tempdir;

    #[test]
    fn test_classify_each_supported_type() {
        let dir = tempdir().unwrap();
        let cases = [
            ("id_rsa", fixtures::RSA_PRIVATE, KeyType::Rsa),
            ("id_ed25519", fixtures::ED25519_PRIVATE, KeyType::Ed25519),
            ("id_dsa", fixtures::DSA_PRIVATE, KeyType::Dsa),
            ("id_ecdsa", fixtures::ECDSA_PRIVATE, KeyType::Ecdsa),
        ];

        for (name, contents, expected) in cases {
            let path = fixtures::write(dir.path(), name, contents);
            let key_type = classify(&path).unwrap();
            assert_eq!(key_type, expected, "wrong classification for {name}");
        }
    }

    #[test]
    fn test_classify_missing_file() {
        let result = classify(Path::new("/nonexistent/id_rsa"));
        assert!(matches!(result, Err(SshError::NotFound(_))));
    }

    #[test]
    fn test_classify_garbage_exhausts_all_attempts() {
        let dir = tempdir().unwrap();
        let path = fixtures::write(dir.path(), "garbage", "not a key at all\n");

        // Every attempt must report a mismatch before the file is declared
        // unsupported.
        for (_, attempt) in PARSE_ATTEMPTS {
            assert_eq!(attempt("not a key at all\n"), ParseOutcome::FormatMismatch);
        }
        assert!(matches!(
            classify(&path),
            Err(SshError::UnsupportedKeyFormat(_))
        ));
    }

    #[test]
    fn test_classify_encrypted_pem_stops_at_first_attempt() {
        let dir = tempdir().unwrap();
        let path = fixtures::write(dir.path(), "id_rsa", fixtures::RSA_ENCRYPTED);

        // The first attempt in the order already reports the passphrase
        // problem; later algorithms are never consulted.
        assert_eq!(
            try_parse_rsa(fixtures::RSA_ENCRYPTED),
            ParseOutcome::PassphraseRequired
        );
        assert!(matches!(
            classify(&path),
            Err(SshError::PassphraseRequired(_))
        ));
    }

    #[test]
    fn test_classify_encrypted_openssh_envelope() {
        let dir = tempdir().unwrap();
        let path = fixtures::write(dir.path(), "id_ed25519", fixtures::ED25519_ENCRYPTED);

        assert!(matches!(
            classify(&path),
            Err(SshError::PassphraseRequired(_))
        ));
    }

    #[test]
    fn test_openssh_cipher_name() {
        let blob = pem_body(fixtures::ED25519_PRIVATE).unwrap();
        assert_eq!(openssh_cipher_name(&blob), Some(&b"none"[..]));

        let encrypted = pem_body(fixtures::ED25519_ENCRYPTED).unwrap();
        assert_eq!(openssh_cipher_name(&encrypted), Some(&b"aes256-ctr"[..]));
    }

    #[test]
    fn test_algorithm_family_mapping() {
        assert_eq!(algorithm_family("ssh-ed25519"), Some(KeyType::Ed25519));
        assert_eq!(algorithm_family("rsa-sha2-512"), Some(KeyType::Rsa));
        assert_eq!(algorithm_family("ssh-dss"), Some(KeyType::Dsa));
        assert_eq!(
            algorithm_family("ecdsa-sha2-nistp384"),
            Some(KeyType::Ecdsa)
        );
        assert_eq!(algorithm_family("ssh-something-else"), None);
    }

    #[test]
    fn test_load_key_missing_file() {
        let result = load_key(Path::new("/nonexistent/id_ed25519"));
        assert!(matches!(result, Err(SshError::NotFound(_))));
    }

    #[test]
    fn test_load_key_ed25519() {
        let dir = tempdir().unwrap();
        let path = fixtures::write(dir.path(), "id_ed25519", fixtures::ED25519_PRIVATE);

        let key = load_key(&path).unwrap();
        assert_eq!(key.algorithm().as_str(), "ssh-ed25519");
    }
}
