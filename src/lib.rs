//! # authgrid
//!
//! Passwordless authentication by public-key challenge-response. A client
//! registers a public key and receives a handle; to log in it asks for a
//! single-use nonce, signs it with the private key, and trades the signature
//! for a session token.
//!
//! ## Layout
//! - [`crypto`] / [`codec`]: key parsing, signature checks, base64
//! - [`store`]: storage traits with in-memory and SQLite backends
//! - [`registry`], [`challenge`], [`session`]: the three stateful components
//! - [`protocol`]: the register / challenge / verify orchestration
//! - [`router`], [`handlers`], [`middleware`]: the HTTP surface
//! - [`client`]: key generation, local key storage and an HTTP client

pub mod challenge;
pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;
pub mod state;
pub mod store;
pub mod types;
