//! # HTTP Request Handlers
//!
//! Thin adapters between JSON bodies and [`crate::protocol::AuthProtocol`].
//!
//! ## Submodules
//! - `auth`: register, challenge, verify, logout, session
//! - `users`: identity lookup and the current user
//! - `health`: liveness probe

pub mod auth;
pub mod health;
pub mod users;
