//! Registration and lookup flows.

use crate::envelope::{Envelope, GatewayResponse, Request};
use crate::error::HandlerError;
use crate::validation::RegistrationFields;
use axum::http::StatusCode;
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use user_store::{PutOutcome, StoreError, UserRecord, UserStore};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// User as returned by lookup. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub username: String,
    pub email: String,
}

impl From<&UserRecord> for PublicUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone(),
            email: record.email.clone(),
        }
    }
}

/// Dispatches envelopes to the register and lookup flows.
///
/// Stateless apart from the injected store; safe to share across requests.
pub struct RegistrationHandler {
    store: Arc<dyn UserStore>,
    store_timeout: Duration,
}

impl RegistrationHandler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Override the per-call store timeout.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Normalize the envelope and run the matching flow.
    pub async fn handle(&self, envelope: Envelope) -> GatewayResponse {
        guarded(async {
            match envelope.normalize()? {
                Request::Register(fields) => self.try_register(fields).await,
                Request::Lookup(username) => self.try_lookup(username.as_deref()).await,
                Request::Unsupported(method) => Err(HandlerError::UnsupportedOperation(method)),
            }
        })
        .await
    }

    /// Validate and create a user.
    pub async fn register(&self, fields: RegistrationFields) -> GatewayResponse {
        guarded(self.try_register(fields)).await
    }

    /// Fetch a user by username, without the password.
    pub async fn lookup(&self, username: Option<&str>) -> GatewayResponse {
        guarded(self.try_lookup(username)).await
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> Result<usize, StoreError> {
        self.call_store(self.store.count()).await
    }

    #[instrument(skip_all, fields(username = ?fields.username))]
    async fn try_register(
        &self,
        fields: RegistrationFields,
    ) -> Result<GatewayResponse, HandlerError> {
        info!("Registration request received");

        // Invalid input never reaches the store.
        let record = fields.into_record().map_err(HandlerError::Validation)?;
        let username = record.username.clone();

        match self.call_store(self.store.put_if_absent(record)).await? {
            PutOutcome::Created => {
                info!(%username, "User registered successfully");
                Ok(GatewayResponse::new(
                    StatusCode::CREATED,
                    json!({
                        "success": true,
                        "message": format!("User {} registered successfully.", username),
                    }),
                ))
            }
            PutOutcome::AlreadyExists => Err(HandlerError::Conflict(username)),
        }
    }

    #[instrument(skip(self))]
    async fn try_lookup(&self, username: Option<&str>) -> Result<GatewayResponse, HandlerError> {
        let username = username
            .filter(|u| !u.is_empty())
            .ok_or(HandlerError::MissingUsername)?;

        let record = self
            .call_store(self.store.get(username))
            .await?
            .ok_or_else(|| HandlerError::NotFound(username.to_string()))?;

        Ok(GatewayResponse::new(
            StatusCode::OK,
            json!({ "success": true, "user": PublicUser::from(&record) }),
        ))
    }

    async fn call_store<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }
}

/// Run a flow, turning errors and panics into responses.
async fn guarded<F>(flow: F) -> GatewayResponse
where
    F: Future<Output = Result<GatewayResponse, HandlerError>>,
{
    match AssertUnwindSafe(flow).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => err.into(),
        Err(panic) => HandlerError::Unexpected(panic_message(panic.as_ref())).into(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
