//! # Authentication Protocol
//!
//! Orchestrates the three-step challenge-response flow:
//!
//! ```text
//! Registered --challenge()--> ChallengeIssued --verify()--> Verified  (token issued)
//!                                             \-----------> Rejected  (restart from challenge())
//! ```
//!
//! ## Fail-closed verify
//! `verify` consumes the challenge *before* looking at the signature. If the
//! challenge is missing, stale, reused or does not match, no signature check
//! happens at all. Every protocol-level failure collapses into
//! [`VerifyOutcome::Rejected`] so callers cannot tell a bad nonce from a bad
//! signature. Only an unknown handle (and storage failures) surface as errors.

use crate::challenge::ChallengeStore;
use crate::clock::Clock;
use crate::codec;
use crate::crypto::{Algorithm, PublicKey};
use crate::error::{AuthError, AuthResult};
use crate::registry::IdentityRegistry;
use crate::session::{Session, SessionIssuer};
use crate::store::{Challenge, ChallengeBackend, Identity, IdentityStore, SessionBackend, SessionRecord};
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;

/// Tunables for one protocol instance.
#[derive(Debug, Clone)]
pub struct ProtocolSettings {
    /// Domain part of generated handles
    pub domain: String,
    pub challenge_ttl: Duration,
    pub session_ttl: Duration,
    /// Algorithms accepted at registration. Strict deployments drop `ecdsa`.
    pub allowed_algorithms: Vec<Algorithm>,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            domain: "authgrid.net".to_string(),
            challenge_ttl: Duration::seconds(crate::challenge::DEFAULT_CHALLENGE_TTL_SECS),
            session_ttl: Duration::seconds(crate::session::DEFAULT_SESSION_TTL_SECS),
            allowed_algorithms: Algorithm::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Verified(Session),
    Rejected,
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified(_))
    }
}

pub struct AuthProtocol {
    registry: IdentityRegistry,
    challenges: ChallengeStore,
    sessions: SessionIssuer,
    allowed_algorithms: HashSet<Algorithm>,
}

impl AuthProtocol {
    pub fn new(
        registry: IdentityRegistry,
        challenges: ChallengeStore,
        sessions: SessionIssuer,
        allowed_algorithms: impl IntoIterator<Item = Algorithm>,
    ) -> Self {
        Self {
            registry,
            challenges,
            sessions,
            allowed_algorithms: allowed_algorithms.into_iter().collect(),
        }
    }

    /// Wire every component to one backend that stores all three record kinds.
    pub fn with_store<S>(store: Arc<S>, clock: Arc<dyn Clock>, settings: &ProtocolSettings) -> Self
    where
        S: IdentityStore + ChallengeBackend + SessionBackend + 'static,
    {
        let registry = IdentityRegistry::new(store.clone(), clock.clone(), settings.domain.clone());
        let challenges = ChallengeStore::new(
            store.clone(),
            store.clone(),
            clock.clone(),
            settings.challenge_ttl,
        );
        let sessions = SessionIssuer::new(store, clock, settings.session_ttl);

        Self::new(
            registry,
            challenges,
            sessions,
            settings.allowed_algorithms.iter().copied(),
        )
    }

    pub fn challenge_ttl(&self) -> Duration {
        self.challenges.ttl()
    }

    /// Register a raw public key under a newly derived handle.
    pub async fn register(&self, public_key: &[u8], algorithm: Algorithm) -> AuthResult<Identity> {
        if !self.allowed_algorithms.contains(&algorithm) {
            return Err(AuthError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        self.registry.register(public_key, algorithm).await
    }

    /// Register from wire form: base64 key plus `key_type` name.
    ///
    /// The algorithm is checked before the key is decoded, so an unsupported
    /// `key_type` is reported as such even when the key is also malformed.
    pub async fn register_encoded(&self, public_key: &str, key_type: &str) -> AuthResult<Identity> {
        let algorithm: Algorithm = key_type.parse()?;
        if !self.allowed_algorithms.contains(&algorithm) {
            return Err(AuthError::UnsupportedAlgorithm(key_type.to_string()));
        }
        let key_bytes = codec::decode_field("public key", public_key)?;
        self.register(&key_bytes, algorithm).await
    }

    /// Start an attempt: issue a nonce for `handle` to sign.
    pub async fn challenge(&self, handle: &str) -> AuthResult<Challenge> {
        self.challenges.issue(handle).await
    }

    /// Finish an attempt.
    ///
    /// Errors only with `UnknownHandle` or storage failures; everything else
    /// is `Ok(VerifyOutcome::Rejected)`.
    pub async fn verify(&self, handle: &str, nonce: &[u8], signature: &[u8]) -> AuthResult<VerifyOutcome> {
        let identity = self.registry.lookup(handle).await?;

        match self.challenges.consume(handle, nonce).await {
            Ok(()) => {}
            Err(AuthError::Challenge(reason)) => {
                tracing::info!(handle, %reason, "Verify rejected");
                return Ok(VerifyOutcome::Rejected);
            }
            Err(other) => return Err(other),
        }

        // Algorithm comes from the registration record, never from the request
        let key = match PublicKey::parse(identity.algorithm, &identity.public_key) {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(handle, "Stored public key no longer parses: {}", e);
                return Ok(VerifyOutcome::Rejected);
            }
        };

        if key.verify(nonce, signature).is_err() {
            tracing::info!(handle, reason = "signature invalid", "Verify rejected");
            return Ok(VerifyOutcome::Rejected);
        }

        let session = self.sessions.issue(handle).await?;
        tracing::info!(handle, expires_at = %session.expires_at, "Verify succeeded");
        Ok(VerifyOutcome::Verified(session))
    }

    pub async fn lookup(&self, handle: &str) -> AuthResult<Identity> {
        self.registry.lookup(handle).await
    }

    pub async fn validate_session(&self, token: &str) -> AuthResult<SessionRecord> {
        self.sessions.validate(token).await
    }

    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        self.sessions.revoke(token).await
    }

    /// Sweep expired challenges and sessions. Returns `(challenges, sessions)` removed.
    pub async fn purge_expired(&self) -> AuthResult<(u64, u64)> {
        let challenges = self.challenges.purge_expired().await?;
        let sessions = self.sessions.purge_expired().await?;
        Ok((challenges, sessions))
    }
}
