//! # Records
//!
//! The three records the protocol owns: identities, challenges and sessions.
//! Timestamps are `DateTime<Utc>` in memory; the SQLite backend stores them as
//! RFC 3339 text plus Unix milliseconds where they are compared.

use crate::crypto::Algorithm;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered public key.
///
/// Created once by registration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Opaque row identifier (UUID v4), returned as `id` by `/register`
    pub id: Uuid,

    /// Globally unique handle, e.g. `3f2a9c01bd@authgrid.net`
    pub handle: String,

    /// Normalized public key bytes (see [`crate::crypto::PublicKey::to_normalized_bytes`])
    #[serde(skip)]
    pub public_key: Vec<u8>,

    /// Fixed at registration; verification never looks anywhere else.
    pub algorithm: Algorithm,

    pub created_at: DateTime<Utc>,
}

/// A single-use login challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub handle: String,
    pub nonce: Vec<u8>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl Challenge {
    pub fn new(handle: String, nonce: Vec<u8>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            handle,
            nonce,
            issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
        }
    }

    /// A challenge is dead from `expires_at` onwards, inclusive.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Server-side record of an issued session.
///
/// Keyed by the SHA-256 of the token; the token itself only exists in the
/// [`crate::session::Session`] handed back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_hash: String,
    pub handle: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_expires_exactly_at_ttl() {
        let t = Utc::now();
        let challenge = Challenge::new("h".into(), vec![0; 32], t, Duration::seconds(120));

        assert!(!challenge.is_expired(t));
        assert!(!challenge.is_expired(t + Duration::seconds(119)));
        assert!(challenge.is_expired(t + Duration::seconds(120)));
        assert!(challenge.is_expired(t + Duration::seconds(121)));
    }

    #[test]
    fn identity_serialization_omits_raw_key() {
        let identity = Identity {
            id: Uuid::new_v4(),
            handle: "abc@authgrid.net".into(),
            public_key: vec![1, 2, 3],
            algorithm: Algorithm::Ed25519,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("public_key").is_none());
        assert_eq!(json["algorithm"], "ed25519");
    }
}
