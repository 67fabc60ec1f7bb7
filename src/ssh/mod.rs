//! SSH module - sessions, key classification and the transport seam
//!
//! This module provides the client-side SSH functionality using the russh
//! library.
//!
//! # Features
//! - Password and private-key authentication
//! - Private-key algorithm classification by trial parsing
//! - Remote command execution with captured stdout/stderr
//! - A transport trait so tests can substitute an in-memory fake

mod client;
mod config;
mod error;
mod keys;
mod session;
mod transport;

pub use client::{ClientHandler, RusshTransport};
pub use config::{expand_tilde, AuthMethod, SshConfig};
pub use error::SshError;
pub use keys::{classify, load_key, KeyType, ParseOutcome};
pub use session::{AuthMode, SshSession};
pub use transport::{AuthAttempt, ExecOutput, Transport, TransportHandle};
