//! HTTP request handlers.
//!
//! Each route builds an [`Envelope`] and hands it to the registration handler,
//! so HTTP requests and direct invocations share one code path.

use super::types::HealthResponse;
use super::AppState;
use crate::envelope::{Envelope, GatewayResponse};
use crate::error::HandlerError;
use axum::{
    extract::{Path, State},
    http::Method,
    Json,
};
use tracing::warn;

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let user_count = match state.handler.user_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Health check could not count users");
            None
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        table: state.table.to_string(),
        user_count,
    })
}

/// Register a user from the raw request body.
pub async fn register_user(State(state): State<AppState>, body: String) -> GatewayResponse {
    state.handler.handle(Envelope::post(body)).await
}

/// Look up a user by username.
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> GatewayResponse {
    state.handler.handle(Envelope::get(username)).await
}

/// `GET /users`: a lookup with no username in the path.
pub async fn get_user_without_username(State(state): State<AppState>) -> GatewayResponse {
    state.handler.handle(Envelope::with_method("GET")).await
}

/// Any other method on a user route.
pub async fn method_not_allowed(method: Method) -> GatewayResponse {
    HandlerError::UnsupportedOperation(method.to_string()).into()
}

/// Direct invocation with a raw gateway envelope.
///
/// The HTTP status is always 200; the outcome is in the returned envelope,
/// including when the envelope itself cannot be decoded.
pub async fn invoke(State(state): State<AppState>, body: String) -> Json<GatewayResponse> {
    let response = match serde_json::from_str::<Envelope>(&body) {
        Ok(envelope) => state.handler.handle(envelope).await,
        Err(e) => HandlerError::MalformedInput(e.to_string()).into(),
    };
    Json(response)
}
