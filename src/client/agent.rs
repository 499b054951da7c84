//! HTTP driver for the register / challenge / verify flow.

use super::{ClientError, KeyStore, Keypair, StoredIdentity};
use crate::codec;
use crate::crypto::Algorithm;
use crate::types::{
    ChallengeRequest, ChallengeResponse, ErrorResponse, RegisterRequest, RegisterResponse,
    VerifyRequest, VerifyResponse,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Which algorithm a new identity gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlgorithmPolicy {
    /// Ed25519, falling back to ECDSA P-256 when the key store cannot hold Ed25519 keys.
    #[default]
    PreferEd25519,
    Ed25519Only,
    EcdsaOnly,
}

impl AlgorithmPolicy {
    pub fn choose(&self, store: &dyn KeyStore) -> Result<Algorithm, ClientError> {
        let wanted = match self {
            AlgorithmPolicy::PreferEd25519 => {
                if store.supports(Algorithm::Ed25519) {
                    return Ok(Algorithm::Ed25519);
                }
                tracing::warn!("Key store lacks Ed25519 support, falling back to ECDSA P-256");
                Algorithm::EcdsaP256Sha256
            }
            AlgorithmPolicy::Ed25519Only => Algorithm::Ed25519,
            AlgorithmPolicy::EcdsaOnly => Algorithm::EcdsaP256Sha256,
        };

        if store.supports(wanted) {
            Ok(wanted)
        } else {
            Err(ClientError::UnsupportedAlgorithm(wanted))
        }
    }
}

/// A session obtained by [`AuthClient::login`].
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub handle: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn KeyStore>,
    policy: AlgorithmPolicy,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn KeyStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            policy: AlgorithmPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AlgorithmPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &dyn KeyStore {
        self.store.as_ref()
    }

    /// Generate a keypair, register its public half and persist it under the
    /// handle the server assigns.
    pub async fn register(&self) -> Result<StoredIdentity, ClientError> {
        let algorithm = self.policy.choose(self.store.as_ref())?;
        let keypair = Keypair::generate(algorithm);

        let request = RegisterRequest {
            public_key: codec::encode(&keypair.public_key_bytes()),
            key_type: algorithm.as_str().to_string(),
        };
        let registered: RegisterResponse = self.post_json("/register", &request, None).await?;

        let identity = StoredIdentity::new(registered.handle, &keypair, registered.created_at);
        self.store.save(&identity)?;

        tracing::info!("Registered {} ({})", identity.handle, algorithm);
        Ok(identity)
    }

    /// Challenge, sign, verify. A `verified: false` answer is `ClientError::Rejected`.
    pub async fn login(&self, handle: &str) -> Result<LoginSession, ClientError> {
        let identity = self.store.load(handle)?;
        let keypair = identity.keypair()?;

        let challenge: ChallengeResponse = self
            .post_json(
                "/challenge",
                &ChallengeRequest {
                    handle: handle.to_string(),
                },
                None,
            )
            .await?;

        let nonce = codec::decode(&challenge.challenge)
            .map_err(|_| ClientError::CorruptKey("server sent a malformed challenge".to_string()))?;
        let signature = keypair.sign(&nonce);

        let request = VerifyRequest {
            handle: handle.to_string(),
            challenge: challenge.challenge,
            signature: codec::encode(&signature),
        };
        let verified: VerifyResponse = self.post_json("/verify", &request, None).await?;

        match (verified.verified, verified.token) {
            (true, Some(token)) => Ok(LoginSession {
                handle: handle.to_string(),
                token,
                expires_at: verified.expires_at,
            }),
            _ => Err(ClientError::Rejected),
        }
    }

    pub async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post_json("/logout", &serde_json::json!({}), Some(token))
            .await?;
        Ok(())
    }

    async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        bearer: Option<&str>,
    ) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let mut request = self.http.post(format!("{}{}", self.base_url, path)).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
