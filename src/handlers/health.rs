//! # Health Check Handler
//!
//! Used by load balancers and monitoring. Never fails.

use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

/// `GET /health`
///
/// ```json
/// { "status": "healthy", "service": "authgrid", "time": "2025-01-15T10:30:00Z" }
/// ```
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "authgrid",
        "time": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }))
}
