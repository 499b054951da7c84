//! Global request rate limiting.
//!
//! A single token bucket shared by every request (governor), applied to the
//! protocol endpoints. Exceeding it yields `429 {"error": "Rate limit exceeded"}`.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

#[derive(Clone)]
pub struct RequestLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RequestLimiter {
    /// `per_second` sustained requests with bursts up to `burst`. Zero is clamped to 1.
    pub fn new(per_second: u32, burst: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn check(&self) -> Result<(), AppError> {
        self.limiter.check().map_err(|_| {
            tracing::warn!("Rate limit exceeded");
            AppError::RateLimited
        })
    }
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.limiter.check()?;
    Ok(next.run(request).await)
}
