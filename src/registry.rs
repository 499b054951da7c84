//! # Identity Registry
//!
//! Maps handles to registered public keys and their signature algorithm.
//! There is no update or delete: one identity per handle, forever.

use crate::clock::Clock;
use crate::crypto::{self, Algorithm, PublicKey};
use crate::error::{AuthError, AuthResult};
use crate::store::{Identity, IdentityStore};
use std::sync::Arc;
use uuid::Uuid;

pub struct IdentityRegistry {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    domain: String,
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>, domain: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            domain: domain.into(),
        }
    }

    /// Register a public key.
    ///
    /// The key must parse as a valid point for `algorithm`. The handle is
    /// derived from the normalized key, so the same key registered twice
    /// (in any accepted encoding) fails with `DuplicateHandle`.
    pub async fn register(&self, public_key: &[u8], algorithm: Algorithm) -> AuthResult<Identity> {
        let parsed = PublicKey::parse(algorithm, public_key)?;
        let normalized = parsed.to_normalized_bytes();

        let identity = Identity {
            id: Uuid::new_v4(),
            handle: crypto::derive_handle(&normalized, &self.domain),
            public_key: normalized,
            algorithm,
            created_at: self.clock.now(),
        };

        self.store.insert_identity(&identity).await?;
        tracing::info!(handle = %identity.handle, algorithm = %algorithm, "Identity registered");

        Ok(identity)
    }

    pub async fn lookup(&self, handle: &str) -> AuthResult<Identity> {
        self.store
            .get_identity(handle)
            .await?
            .ok_or(AuthError::UnknownHandle)
    }
}
