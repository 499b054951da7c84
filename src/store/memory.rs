//! In-process storage backed by `DashMap`.
//!
//! Every per-handle operation runs under the shard lock for that handle's
//! entry, so operations on one handle serialize while different handles
//! proceed in parallel.

use super::{Challenge, ChallengeBackend, Identity, IdentityStore, SessionBackend, SessionRecord};
use crate::error::{AuthError, AuthResult, ChallengeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use subtle::ConstantTimeEq;

#[derive(Debug, Default)]
pub struct MemoryStore {
    identities: DashMap<String, Identity>,
    challenges: DashMap<String, Challenge>,
    sessions: DashMap<String, SessionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_identity(&self, identity: &Identity) -> AuthResult<()> {
        match self.identities.entry(identity.handle.clone()) {
            Entry::Occupied(_) => Err(AuthError::DuplicateHandle),
            Entry::Vacant(slot) => {
                slot.insert(identity.clone());
                Ok(())
            }
        }
    }

    async fn get_identity(&self, handle: &str) -> AuthResult<Option<Identity>> {
        Ok(self.identities.get(handle).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ChallengeBackend for MemoryStore {
    async fn put_challenge(&self, challenge: &Challenge) -> AuthResult<()> {
        self.challenges
            .insert(challenge.handle.clone(), challenge.clone());
        Ok(())
    }

    async fn consume_challenge(
        &self,
        handle: &str,
        nonce: &[u8],
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        // get_mut holds the shard write lock until `entry` drops
        let mut entry = self
            .challenges
            .get_mut(handle)
            .ok_or(ChallengeError::NotFound)?;
        let challenge = entry.value_mut();

        if !bool::from(challenge.nonce.as_slice().ct_eq(nonce)) {
            return Err(ChallengeError::NonceMismatch.into());
        }
        if challenge.consumed {
            return Err(ChallengeError::AlreadyConsumed.into());
        }
        if challenge.is_expired(now) {
            return Err(ChallengeError::Expired.into());
        }

        challenge.consumed = true;
        Ok(())
    }

    async fn purge_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let before = self.challenges.len();
        self.challenges.retain(|_, challenge| !challenge.is_expired(now));
        Ok(before.saturating_sub(self.challenges.len()) as u64)
    }
}

#[async_trait]
impl SessionBackend for MemoryStore {
    async fn insert_session(&self, record: &SessionRecord) -> AuthResult<()> {
        self.sessions
            .insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn get_session(&self, token_hash: &str) -> AuthResult<Option<SessionRecord>> {
        Ok(self.sessions.get(token_hash).map(|entry| entry.value().clone()))
    }

    async fn remove_session(&self, token_hash: &str) -> AuthResult<bool> {
        Ok(self.sessions.remove(token_hash).is_some())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
