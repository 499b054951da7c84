//! HTTP routing.
//!
//! | Method | Path             | Auth    |
//! |--------|------------------|---------|
//! | GET    | `/health`        | none    |
//! | POST   | `/register`      | none    |
//! | POST   | `/challenge`     | none    |
//! | POST   | `/verify`        | none    |
//! | POST   | `/logout`        | token   |
//! | GET    | `/session`       | none    |
//! | GET    | `/user/{handle}` | none    |
//! | GET    | `/me`            | token   |
//!
//! A token is either `Authorization: Bearer <token>` or the cookie session
//! established by a successful `/verify`.

use crate::handlers::auth::{challenge, logout, register, session_info, verify};
use crate::handlers::health::health_check;
use crate::handlers::users::{get_current_user, get_user};
use crate::middleware::{auth::require_auth, rate_limit::rate_limit};
use crate::state::AppState;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

pub fn build_router<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    // After 24 hours without activity the cookie session is dropped
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected_routes = Router::new()
        .route("/me", get(get_current_user))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let protocol_routes = Router::new()
        .route("/register", post(register))
        .route("/challenge", post(challenge))
        .route("/verify", post(verify))
        .route("/logout", post(logout))
        .route("/session", get(session_info))
        .route("/user/{handle}", get(get_user))
        .merge(protected_routes)
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health_check))
        .merge(protocol_routes)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::codec;
    use crate::middleware::rate_limit::RequestLimiter;
    use crate::protocol::{AuthProtocol, ProtocolSettings};
    use crate::store::memory::MemoryStore;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use ed25519_dalek::{Signer as _, SigningKey};
    use rand::rngs::OsRng;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with_limit(per_second: u32, burst: u32) -> Router {
        let protocol = AuthProtocol::with_store(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            &ProtocolSettings::default(),
        );
        let state = AppState {
            protocol: Arc::new(protocol),
            limiter: RequestLimiter::new(per_second, burst),
        };
        build_router(state, tower_sessions::MemoryStore::default())
    }

    fn app() -> Router {
        app_with_limit(1_000, 1_000)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, key: &SigningKey) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/register",
                json!({
                    "public_key": codec::encode(key.verifying_key().as_bytes()),
                    "key_type": "ed25519"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["handle"].as_str().unwrap().to_string()
    }

    async fn signed_verify_body(app: &Router, key: &SigningKey, handle: &str) -> Value {
        let response = app
            .clone()
            .oneshot(post_json("/challenge", json!({ "handle": handle })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let challenge = json_body(response).await["challenge"].as_str().unwrap().to_string();

        let nonce = codec::decode(&challenge).unwrap();
        let signature = key.sign(&nonce);
        json!({
            "handle": handle,
            "challenge": challenge,
            "signature": codec::encode(&signature.to_bytes()),
        })
    }

    #[tokio::test]
    async fn health_check_works() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn full_login_flow() {
        let app = app();
        let key = SigningKey::generate(&mut OsRng);
        let handle = register(&app, &key).await;
        assert!(handle.ends_with("@authgrid.net"));

        let body = signed_verify_body(&app, &key, &handle).await;
        let response = app.clone().oneshot(post_json("/verify", body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let verified = json_body(response).await;
        assert_eq!(verified["verified"], true);
        let token = verified["token"].as_str().unwrap().to_string();

        let response = app.clone().oneshot(get_with_token("/me", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let me = json_body(response).await;
        assert_eq!(me["handle"], handle.as_str());
        assert_eq!(me["key_type"], "ed25519");

        // Replaying the same signed challenge is rejected without a reason
        let response = app.clone().oneshot(post_json("/verify", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "verified": false }));

        let logout = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(logout).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_with_token("/me", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_sets_cookie_session() {
        let app = app();
        let key = SigningKey::generate(&mut OsRng);
        let handle = register(&app, &key).await;

        let body = signed_verify_body(&app, &key, &handle).await;
        let response = app.clone().oneshot(post_json("/verify", body)).await.unwrap();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string();

        let request = Request::builder()
            .uri("/session")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let info = json_body(response).await;
        assert_eq!(info["authenticated"], true);
        assert_eq!(info["handle"], handle.as_str());
    }

    #[tokio::test]
    async fn session_without_credentials_is_unauthenticated() {
        let response = app()
            .oneshot(Request::builder().uri("/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "authenticated": false }));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = app();
        let key = SigningKey::generate(&mut OsRng);
        register(&app, &key).await;

        let response = app
            .oneshot(post_json(
                "/register",
                json!({
                    "public_key": codec::encode(key.verifying_key().as_bytes()),
                    "key_type": "ed25519"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"], "Handle already exists");
    }

    #[tokio::test]
    async fn bad_requests() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json("/register", json!({ "public_key": "AAAA", "key_type": "rsa" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_json("/register", json!({ "public_key": "!!!", "key_type": "ed25519" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_json("/challenge", json!({ "handle": "" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_json("/verify", json!({ "handle": "x@authgrid.net" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn malformed_signature_is_reported() {
        let app = app();
        let key = SigningKey::generate(&mut OsRng);
        let handle = register(&app, &key).await;

        let mut body = signed_verify_body(&app, &key, &handle).await;
        body["signature"] = json!("not base64!");
        let response = app.oneshot(post_json("/verify", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid signature encoding");
    }

    #[tokio::test]
    async fn unknown_handles_are_not_found() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json("/challenge", json!({ "handle": "nobody@authgrid.net" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(Request::builder().uri("/user/nobody@authgrid.net").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn public_lookup_returns_key() {
        let app = app();
        let key = SigningKey::generate(&mut OsRng);
        let handle = register(&app, &key).await;

        let response = app
            .oneshot(Request::builder().uri(format!("/user/{}", handle)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let user = json_body(response).await;
        assert_eq!(user["public_key"], codec::encode(key.verifying_key().as_bytes()));
    }

    #[tokio::test]
    async fn logout_needs_a_token_but_not_a_live_one() {
        let app = app();
        let logout = |token: Option<&str>| {
            let mut builder = Request::builder().method("POST").uri("/logout");
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            builder.body(Body::empty()).unwrap()
        };

        let response = app.clone().oneshot(logout(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(logout(Some("never-issued"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }

    #[tokio::test]
    async fn me_requires_a_token() {
        let response = app()
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app().oneshot(get_with_token("/me", "bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rate_limit_applies_to_protocol_routes() {
        let app = app_with_limit(1, 1);
        let challenge = || post_json("/challenge", json!({ "handle": "nobody@authgrid.net" }));

        let first = app.clone().oneshot(challenge()).await.unwrap();
        assert_eq!(first.status(), StatusCode::NOT_FOUND);

        let second = app.clone().oneshot(challenge()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // Health is outside the limiter
        let health = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
