use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

/// Cookie-session keys written by `/verify`.
pub const SESSION_HANDLE_KEY: &str = "handle";
pub const SESSION_TOKEN_KEY: &str = "token";

/// The handle a request was authenticated as. Inserted into request
/// extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedHandle(pub String);

/// `Authorization: Bearer <token>`, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The session token a request presents: bearer header first, then the cookie session.
pub async fn presented_token(headers: &HeaderMap, session: &Session) -> Result<Option<String>, AppError> {
    if let Some(token) = bearer_token(headers) {
        return Ok(Some(token));
    }
    Ok(session.get::<String>(SESSION_TOKEN_KEY).await?)
}

pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = presented_token(request.headers(), &session)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let record = state.protocol.validate_session(&token).await?;
    request
        .extensions_mut()
        .insert(AuthenticatedHandle(record.handle));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_bearer_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
