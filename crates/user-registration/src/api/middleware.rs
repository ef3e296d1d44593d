//! Global request rate limiting.

use crate::envelope::GatewayResponse;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

pub const RATE_LIMITED: &str = "Rate limit exceeded.";

/// Requests per minute when nothing is configured.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 600;

/// One bucket shared by every client.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimitState {
    /// Allow `requests_per_minute` across all routes. Zero is treated as one.
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    /// High enough that tests never hit it.
    pub fn permissive() -> Self {
        Self::new(100_000)
    }

    fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

/// Answer 429 in the usual error envelope once the quota is spent.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    if !rate_limit.try_acquire() {
        warn!(method = %request.method(), uri = %request.uri(), "Rate limit exceeded");
        return GatewayResponse::error(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED)
            .into_response();
    }

    next.run(request).await
}
