//! # Authentication Handlers
//!
//! The register / challenge / verify flow plus logout and session checks.

use crate::codec;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{presented_token, SESSION_HANDLE_KEY, SESSION_TOKEN_KEY};
use crate::protocol::VerifyOutcome;
use crate::state::AppState;
use crate::types::*;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tower_sessions::Session;

/// Register a public key.
///
/// ## Route
/// POST /register
///
/// ## Request
/// ```json
/// { "public_key": "<base64>", "key_type": "ed25519" }
/// ```
///
/// ## Response
/// ```json
/// { "handle": "3f9a0c17be@authgrid.net", "id": "<uuid>", "created_at": "..." }
/// ```
///
/// 400 for bad base64, a malformed key or an unsupported `key_type`; 409 if
/// the key is already registered.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<RegisterResponse>> {
    let Json(req) = payload?;

    let identity = state
        .protocol
        .register_encoded(&req.public_key, &req.key_type)
        .await?;

    Ok(Json(RegisterResponse {
        handle: identity.handle,
        id: identity.id.to_string(),
        created_at: identity.created_at,
    }))
}

/// Issue a nonce for a registered handle to sign.
///
/// ## Route
/// POST /challenge
///
/// ## Response
/// ```json
/// { "challenge": "<base64 of 32 bytes>", "expires_at": "..." }
/// ```
///
/// Any earlier outstanding challenge for the handle stops being valid.
pub async fn challenge(
    State(state): State<AppState>,
    payload: Result<Json<ChallengeRequest>, JsonRejection>,
) -> AppResult<Json<ChallengeResponse>> {
    let Json(req) = payload?;
    if req.handle.trim().is_empty() {
        return Err(AppError::BadRequest("Handle is required".to_string()));
    }

    let challenge = state.protocol.challenge(&req.handle).await?;

    Ok(Json(ChallengeResponse {
        challenge: codec::encode(&challenge.nonce),
        expires_at: challenge.expires_at,
    }))
}

/// Finish a login with a signature over the challenge bytes.
///
/// ## Route
/// POST /verify
///
/// ## Response
/// ```json
/// { "verified": true, "token": "...", "expires_at": "..." }
/// ```
/// or `{ "verified": false }` with no reason attached. On success the handle
/// and token are also stored in the cookie session.
pub async fn verify(
    session: Session,
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> AppResult<Json<VerifyResponse>> {
    let Json(req) = payload?;
    if req.handle.is_empty() || req.challenge.is_empty() || req.signature.is_empty() {
        return Err(AppError::BadRequest(
            "Handle, challenge, and signature are required".to_string(),
        ));
    }

    // Malformed input is reported distinctly; it says nothing about the key
    let nonce = codec::decode_field("challenge", &req.challenge)?;
    let signature = codec::decode_field("signature", &req.signature)?;

    match state.protocol.verify(&req.handle, &nonce, &signature).await? {
        VerifyOutcome::Verified(issued) => {
            session.insert(SESSION_HANDLE_KEY, &issued.handle).await?;
            session.insert(SESSION_TOKEN_KEY, &issued.token).await?;

            Ok(Json(VerifyResponse {
                verified: true,
                token: Some(issued.token),
                expires_at: Some(issued.expires_at),
            }))
        }
        VerifyOutcome::Rejected => Ok(Json(VerifyResponse::rejected())),
    }
}

/// Revoke the presented token and drop the cookie session.
///
/// ## Route
/// POST /logout
///
/// ## Response
/// ```json
/// { "success": true, "message": "Logged out successfully" }
/// ```
///
/// 401 only when no token is presented; revoking a dead token still succeeds.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
) -> AppResult<Json<Value>> {
    let token = presented_token(&headers, &session)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    state.protocol.logout(&token).await?;
    session.delete().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully"
    })))
}

/// Report whether the presented token or cookie session is live.
///
/// ## Route
/// GET /session
///
/// ## Response
/// ```json
/// { "authenticated": true, "handle": "...", "expires_at": "..." }
/// ```
pub async fn session_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
) -> AppResult<Json<SessionInfoResponse>> {
    let unauthenticated = SessionInfoResponse {
        authenticated: false,
        handle: None,
        expires_at: None,
    };

    let Some(token) = presented_token(&headers, &session).await? else {
        return Ok(Json(unauthenticated));
    };

    match state.protocol.validate_session(&token).await {
        Ok(record) => Ok(Json(SessionInfoResponse {
            authenticated: true,
            handle: Some(record.handle),
            expires_at: Some(record.expires_at),
        })),
        Err(crate::error::AuthError::InvalidToken | crate::error::AuthError::ExpiredToken) => {
            Ok(Json(unauthenticated))
        }
        Err(other) => Err(other.into()),
    }
}
