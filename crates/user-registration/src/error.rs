//! Error types for the registration handler.

use crate::envelope::GatewayResponse;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};
use user_store::StoreError;

pub const MALFORMED_BODY: &str = "Request body must be a valid JSON object.";
pub const USERNAME_PATH_REQUIRED: &str = "Username path parameter is required.";
pub const USER_NOT_FOUND: &str = "User not found.";
pub const USERNAME_EXISTS: &str = "Username already exists.";
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed.";
pub const DATABASE_ERROR: &str = "Database error";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Handler error types.
///
/// Client-caused variants carry structured detail into the response body.
/// `Store` and `Unexpected` are logged in full but answered with an opaque
/// message.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Validation failed: {}", .0.join(" "))]
    Validation(Vec<String>),

    #[error("Malformed request body: {0}")]
    MalformedInput(String),

    #[error("Username path parameter missing")]
    MissingUsername,

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Username already exists: {0}")]
    Conflict(String),

    #[error("Unsupported method: {0}")]
    UnsupportedOperation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Validation(_)
            | HandlerError::MalformedInput(_)
            | HandlerError::MissingUsername => StatusCode::BAD_REQUEST,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::Conflict(_) => StatusCode::CONFLICT,
            HandlerError::UnsupportedOperation(_) => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::Store(_) | HandlerError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn log(&self) {
        match self {
            HandlerError::Validation(errors) => warn!(?errors, "Validation failed"),
            HandlerError::MalformedInput(detail) => warn!(%detail, "Malformed request body"),
            HandlerError::MissingUsername => warn!("Lookup without username"),
            HandlerError::NotFound(username) => info!(%username, "User not found"),
            HandlerError::Conflict(username) => {
                warn!(%username, "Attempted registration of existing username")
            }
            HandlerError::UnsupportedOperation(method) => warn!(%method, "Method not allowed"),
            HandlerError::Store(e) => error!(error = %e, "Store error"),
            HandlerError::Unexpected(detail) => error!(%detail, "Unexpected error in handler"),
        }
    }
}

impl From<HandlerError> for GatewayResponse {
    fn from(err: HandlerError) -> Self {
        err.log();

        let status = err.status();
        match err {
            HandlerError::Validation(errors) => GatewayResponse::errors(status, errors.as_slice()),
            HandlerError::MalformedInput(_) => GatewayResponse::errors(status, &[MALFORMED_BODY]),
            HandlerError::MissingUsername => {
                GatewayResponse::errors(status, &[USERNAME_PATH_REQUIRED])
            }
            HandlerError::NotFound(_) => GatewayResponse::errors(status, &[USER_NOT_FOUND]),
            HandlerError::Conflict(_) => GatewayResponse::error(status, USERNAME_EXISTS),
            HandlerError::UnsupportedOperation(_) => {
                GatewayResponse::errors(status, &[METHOD_NOT_ALLOWED])
            }
            HandlerError::Store(_) => GatewayResponse::error(status, DATABASE_ERROR),
            HandlerError::Unexpected(_) => GatewayResponse::error(status, INTERNAL_ERROR),
        }
    }
}
