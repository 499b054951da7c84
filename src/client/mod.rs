//! # Client Agent
//!
//! The consumer side of the protocol: generate a keypair, keep it in a local
//! key store, and drive register / challenge / verify against a server.
//!
//! Private key storage sits behind the [`keystore::KeyStore`] capability so a
//! stricter backend (an OS keychain, a hardware token) can replace the file
//! store without touching [`agent::AuthClient`].

pub mod agent;
pub mod keypair;
pub mod keystore;

pub use agent::{AlgorithmPolicy, AuthClient, LoginSession};
pub use keypair::Keypair;
pub use keystore::{FileKeyStore, KeyStore, StoredIdentity};

use crate::crypto::Algorithm;
use thiserror::Error;

/// Errors surfaced by the client agent.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key file: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with `{ "error": ... }`
    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("No stored identity for handle {0}")]
    UnknownIdentity(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Key store does not support {0}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("Corrupt key material: {0}")]
    CorruptKey(String),

    #[error("Authentication rejected")]
    Rejected,
}
