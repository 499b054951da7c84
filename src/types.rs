//! # API Types
//!
//! Request/response bodies of the HTTP interface. Field names are fixed for
//! interoperability with existing clients; the reference client in
//! [`crate::client`] uses the same structs.

use crate::crypto::Algorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /register`
///
/// ```json
/// { "public_key": "<base64>", "key_type": "ed25519" }
/// ```
///
/// `key_type` stays a string so an unsupported algorithm is reported as such
/// rather than as a generic body error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub public_key: String,
    pub key_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub handle: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// `POST /challenge`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    #[serde(default)]
    pub handle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Base64 of the 32-byte nonce to sign
    pub challenge: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /verify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub handle: String,
    /// The base64 nonce exactly as received from `/challenge`
    #[serde(default)]
    pub challenge: String,
    /// Base64 signature over the decoded nonce bytes
    #[serde(default)]
    pub signature: String,
}

/// `{ "verified": false }` carries no reason, by design of the protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl VerifyResponse {
    pub fn rejected() -> Self {
        Self {
            verified: false,
            token: None,
            expires_at: None,
        }
    }
}

/// `GET /session`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfoResponse {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `GET /user/{handle}` and `GET /me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub handle: String,
    /// Base64 of the normalized public key
    pub public_key: String,
    pub key_type: Algorithm,
    pub created_at: DateTime<Utc>,
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
