//! # Storage
//!
//! The protocol components never touch a database directly. They own their
//! records through the traits below, and the backend is chosen at startup:
//! - [`memory::MemoryStore`]: process-local, for tests and single-instance deployments
//! - [`sqlite::SqliteStore`]: SQLite via sqlx, shareable between server processes
//!
//! Each backend implements all three traits so one value can be handed to
//! every component.

pub mod memory;
pub mod models;
pub mod sqlite;

use crate::error::AuthResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use models::{Challenge, Identity, SessionRecord};

/// Identity table. Handles are unique and rows are never updated.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a new identity, failing with `DuplicateHandle` if the handle is taken.
    /// The uniqueness check and the insert are one atomic step.
    async fn insert_identity(&self, identity: &Identity) -> AuthResult<()>;

    async fn get_identity(&self, handle: &str) -> AuthResult<Option<Identity>>;
}

/// Outstanding challenges, at most one per handle.
#[async_trait]
pub trait ChallengeBackend: Send + Sync {
    /// Store a challenge, replacing whatever was outstanding for its handle.
    async fn put_challenge(&self, challenge: &Challenge) -> AuthResult<()>;

    /// Atomically check nonce, single use and expiry, then mark consumed.
    ///
    /// Of any number of concurrent calls for the same challenge, at most one
    /// returns `Ok`. Failures are `AuthError::Challenge(..)`.
    async fn consume_challenge(
        &self,
        handle: &str,
        nonce: &[u8],
        now: DateTime<Utc>,
    ) -> AuthResult<()>;

    /// Drop challenges whose expiry has passed. Returns how many were removed.
    async fn purge_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Issued sessions, keyed by token hash.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn insert_session(&self, record: &SessionRecord) -> AuthResult<()>;

    async fn get_session(&self, token_hash: &str) -> AuthResult<Option<SessionRecord>>;

    /// Returns whether a session was actually removed.
    async fn remove_session(&self, token_hash: &str) -> AuthResult<bool>;

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}
