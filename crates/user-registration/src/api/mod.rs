//! HTTP API for the registration service.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{
    rate_limit_middleware, RateLimitState, DEFAULT_REQUESTS_PER_MINUTE, RATE_LIMITED,
};
pub use types::*;

use crate::envelope::GatewayResponse;
use crate::handler::RegistrationHandler;
use axum::{
    http::header,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<RegistrationHandler>,
    /// Table identifier, reported by the health check
    pub table: Arc<str>,
}

impl AppState {
    /// Create new application state.
    pub fn new(handler: RegistrationHandler, table: impl Into<Arc<str>>) -> Self {
        Self {
            handler: Arc::new(handler),
            table: table.into(),
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

/// Create the API router with the default rate limit.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::default())
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/users",
            post(handlers::register_user)
                .get(handlers::get_user_without_username)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/users/:username",
            get(handlers::get_user).fallback(handlers::method_not_allowed),
        )
        .route("/invoke", post(handlers::invoke))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
