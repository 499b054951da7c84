//! # Challenge Store
//!
//! Issues single-use, time-bounded nonces keyed by handle.
//!
//! ## Lifecycle
//! 1. `issue` draws 32 random bytes and overwrites any challenge still
//!    outstanding for the handle (last one wins)
//! 2. `consume` atomically checks nonce, single use and expiry and marks the
//!    challenge consumed
//! 3. expired challenges are swept by `purge_expired`
//!
//! Nonces never appear in logs.

use crate::clock::Clock;
use crate::crypto;
use crate::error::{AuthError, AuthResult};
use crate::store::{Challenge, ChallengeBackend, IdentityStore};
use chrono::Duration;
use std::sync::Arc;

/// Default challenge lifetime in seconds.
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 120;

pub struct ChallengeStore {
    backend: Arc<dyn ChallengeBackend>,
    identities: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ChallengeStore {
    pub fn new(
        backend: Arc<dyn ChallengeBackend>,
        identities: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            identities,
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh challenge for a registered handle.
    pub async fn issue(&self, handle: &str) -> AuthResult<Challenge> {
        if self.identities.get_identity(handle).await?.is_none() {
            return Err(AuthError::UnknownHandle);
        }

        let challenge = Challenge::new(
            handle.to_string(),
            crypto::random_nonce().to_vec(),
            self.clock.now(),
            self.ttl,
        );
        self.backend.put_challenge(&challenge).await?;
        tracing::debug!(handle, expires_at = %challenge.expires_at, "Challenge issued");

        Ok(challenge)
    }

    /// Consume the outstanding challenge for `handle` if `nonce` matches it.
    pub async fn consume(&self, handle: &str, nonce: &[u8]) -> AuthResult<()> {
        self.backend
            .consume_challenge(handle, nonce, self.clock.now())
            .await
    }

    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.backend.purge_expired_challenges(self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::{Algorithm, NONCE_LEN};
    use crate::error::ChallengeError;
    use crate::store::memory::MemoryStore;
    use crate::store::Identity;
    use chrono::Utc;
    use uuid::Uuid;

    fn ttl() -> Duration {
        Duration::seconds(DEFAULT_CHALLENGE_TTL_SECS)
    }

    async fn setup() -> (ChallengeStore, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_identity(&Identity {
                id: Uuid::new_v4(),
                handle: "alice@authgrid.net".into(),
                public_key: vec![0; 32],
                algorithm: Algorithm::Ed25519,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::default());
        let challenges = ChallengeStore::new(store.clone(), store, clock.clone(), ttl());
        (challenges, clock)
    }

    #[tokio::test]
    async fn issues_256_bit_nonces() {
        let (challenges, _) = setup().await;
        let a = challenges.issue("alice@authgrid.net").await.unwrap();
        let b = challenges.issue("alice@authgrid.net").await.unwrap();

        assert_eq!(a.nonce.len(), NONCE_LEN);
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.expires_at - a.issued_at, ttl());
    }

    #[tokio::test]
    async fn unknown_handle_gets_no_challenge() {
        let (challenges, _) = setup().await;
        let err = challenges.issue("nonexistent-handle").await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownHandle));
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_nonce() {
        let (challenges, _) = setup().await;
        let old = challenges.issue("alice@authgrid.net").await.unwrap();
        let new = challenges.issue("alice@authgrid.net").await.unwrap();

        let err = challenges
            .consume("alice@authgrid.net", &old.nonce)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Challenge(ChallengeError::NonceMismatch)));
        challenges.consume("alice@authgrid.net", &new.nonce).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_at_exactly_ttl() {
        let (challenges, clock) = setup().await;
        let challenge = challenges.issue("alice@authgrid.net").await.unwrap();

        clock.advance(ttl());
        let err = challenges
            .consume("alice@authgrid.net", &challenge.nonce)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Challenge(ChallengeError::Expired)));
        assert_eq!(challenges.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn accepted_just_before_ttl() {
        let (challenges, clock) = setup().await;
        let challenge = challenges.issue("alice@authgrid.net").await.unwrap();

        clock.advance(ttl() - Duration::milliseconds(1));
        challenges
            .consume("alice@authgrid.net", &challenge.nonce)
            .await
            .unwrap();
    }
}
