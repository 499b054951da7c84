//! # Error Handling
//!
//! Two layers of errors live here:
//! - [`AuthError`]: the protocol's own taxonomy, returned by the registry,
//!   challenge store, session issuer and [`crate::protocol::AuthProtocol`].
//! - [`AppError`]: the HTTP-facing error, which knows how to turn itself into
//!   a `{ "error": "..." }` JSON response with the right status code.
//!
//! Protocol failures inside `verify` (bad nonce, bad signature, expired or
//! consumed challenge) never reach [`AppError`]: the protocol folds them into
//! `verified: false` before the HTTP layer sees them.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a challenge could not be consumed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("challenge not found")]
    NotFound,

    #[error("challenge expired")]
    Expired,

    #[error("challenge already consumed")]
    AlreadyConsumed,

    #[error("challenge nonce mismatch")]
    NonceMismatch,
}

/// Protocol-level error taxonomy.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Handle not found")]
    UnknownHandle,

    #[error("Handle already exists")]
    DuplicateHandle,

    #[error("Invalid public key: {0}")]
    InvalidKeyEncoding(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Malformed base64 encoding")]
    MalformedEncoding,

    /// Same as `MalformedEncoding` but names the request field at fault.
    #[error("Invalid {0} encoding")]
    MalformedField(&'static str),

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("Signature invalid")]
    SignatureInvalid,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Application-wide HTTP error type.
///
/// Handlers return `AppResult<T>`; the `?` operator converts protocol and
/// session errors automatically through the `#[from]` attributes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Cookie session store failures (tower-sessions)
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Auth(err) => match err {
                AuthError::UnknownHandle => (StatusCode::NOT_FOUND, err.to_string()),
                AuthError::DuplicateHandle => (StatusCode::CONFLICT, err.to_string()),
                AuthError::InvalidKeyEncoding(_)
                | AuthError::UnsupportedAlgorithm(_)
                | AuthError::MalformedEncoding
                | AuthError::MalformedField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                // Only reachable outside of verify (which folds these into `verified: false`)
                AuthError::Challenge(_) | AuthError::SignatureInvalid => {
                    (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
                }
                AuthError::InvalidToken | AuthError::ExpiredToken => {
                    (StatusCode::UNAUTHORIZED, err.to_string())
                }
                AuthError::Storage(e) => {
                    // Log details, don't leak database internals
                    tracing::error!("Storage error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
                }
            },
            AppError::Session(e) => {
                tracing::error!("Session store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
        }
    }
}

/// Convert AppError into an HTTP response of the form `{ "error": "..." }`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

/// Malformed JSON bodies get the same `{ "error": ... }` shape as everything else.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        AppError::BadRequest("Invalid request body".to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
