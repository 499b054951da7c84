//! # Identity Handlers
//!
//! Read-only views of registered identities. Only public material is returned.

use crate::codec;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedHandle;
use crate::state::AppState;
use crate::store::Identity;
use crate::types::UserResponse;
use axum::{
    extract::{Path, State},
    Extension, Json,
};

impl From<Identity> for UserResponse {
    fn from(identity: Identity) -> Self {
        UserResponse {
            public_key: codec::encode(&identity.public_key),
            handle: identity.handle,
            key_type: identity.algorithm,
            created_at: identity.created_at,
        }
    }
}

/// `GET /user/{handle}`: public key lookup for relying parties.
pub async fn get_user(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let identity = state.protocol.lookup(&handle).await?;
    Ok(Json(identity.into()))
}

/// `GET /me`: the identity behind the presented session.
///
/// Sits behind `require_auth`, which has already validated the token.
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(AuthenticatedHandle(handle)): Extension<AuthenticatedHandle>,
) -> AppResult<Json<UserResponse>> {
    let identity = state.protocol.lookup(&handle).await?;
    Ok(Json(identity.into()))
}
