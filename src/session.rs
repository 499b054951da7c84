//! # Session Issuer
//!
//! Mints opaque bearer tokens after a successful verify and answers "who is
//! this token?" afterwards. Tokens are 256 random bits; only their SHA-256 is
//! stored, so a leaked database does not leak live sessions.

use crate::clock::Clock;
use crate::crypto;
use crate::error::{AuthError, AuthResult};
use crate::store::{SessionBackend, SessionRecord};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Default session lifetime in seconds (24 hours).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// A freshly issued session. The only place the plaintext token exists.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub handle: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionIssuer {
    backend: Arc<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(backend: Arc<dyn SessionBackend>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { backend, clock, ttl }
    }

    pub async fn issue(&self, handle: &str) -> AuthResult<Session> {
        let token = crypto::random_token();
        let issued_at = self.clock.now();
        let record = SessionRecord {
            token_hash: crypto::token_hash(&token),
            handle: handle.to_string(),
            issued_at,
            expires_at: issued_at + self.ttl,
        };
        self.backend.insert_session(&record).await?;

        Ok(Session {
            handle: record.handle,
            token,
            issued_at,
            expires_at: record.expires_at,
        })
    }

    /// Resolve a token to its session record.
    pub async fn validate(&self, token: &str) -> AuthResult<SessionRecord> {
        let record = self
            .backend
            .get_session(&crypto::token_hash(token))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if record.is_expired(self.clock.now()) {
            return Err(AuthError::ExpiredToken);
        }
        Ok(record)
    }

    /// End a session. Revoking an unknown or already revoked token is not an error.
    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        if self.backend.remove_session(&crypto::token_hash(token)).await? {
            tracing::info!("Session revoked");
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.backend.purge_expired_sessions(self.clock.now()).await
    }
}
