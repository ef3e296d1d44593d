//! Gateway request/response envelopes and request normalization.

use crate::error::HandlerError;
use crate::validation::RegistrationFields;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Inbound trigger record, in API-gateway proxy shape.
///
/// Fields other than the three recognized ones are kept in `extra` so a
/// direct invocation can carry registration data at the top level.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Operation discriminator
    #[serde(default, alias = "method")]
    pub http_method: Option<String>,

    /// JSON-encoded string or an already-decoded object
    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Canonical operation produced by [`Envelope::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register(RegistrationFields),
    Lookup(Option<String>),
    Unsupported(String),
}

impl Envelope {
    /// A `POST` carrying `body`.
    pub fn post(body: impl Into<Value>) -> Self {
        Self {
            http_method: Some("POST".into()),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// A `GET` for one username.
    pub fn get(username: impl Into<String>) -> Self {
        Self {
            http_method: Some("GET".into()),
            path_parameters: Some(HashMap::from([("username".to_string(), username.into())])),
            ..Self::default()
        }
    }

    /// An envelope carrying only a method.
    pub fn with_method(method: impl Into<String>) -> Self {
        Self {
            http_method: Some(method.into()),
            ..Self::default()
        }
    }

    /// Resolve the operation and decode its input.
    ///
    /// Without a method, registration is inferred: the body is used when
    /// present, otherwise the envelope's own top-level fields.
    pub fn normalize(self) -> Result<Request, HandlerError> {
        let method = match self.http_method.as_deref() {
            Some(m) => m.to_ascii_uppercase(),
            None => return self.into_registration(),
        };

        match method.as_str() {
            "POST" => self.into_registration(),
            "GET" => Ok(Request::Lookup(self.path_username())),
            _ => Ok(Request::Unsupported(method)),
        }
    }

    fn path_username(&self) -> Option<String> {
        self.path_parameters
            .as_ref()
            .and_then(|params| params.get("username"))
            .filter(|username| !username.is_empty())
            .cloned()
    }

    fn into_registration(self) -> Result<Request, HandlerError> {
        let data = match self.body {
            None | Some(Value::Null) => Value::Object(self.extra),
            Some(Value::String(s)) if s.is_empty() => Value::Object(self.extra),
            Some(Value::String(s)) => serde_json::from_str(&s)
                .map_err(|e| HandlerError::MalformedInput(e.to_string()))?,
            Some(decoded) => decoded,
        };

        match data {
            Value::Object(map) => Ok(Request::Register(RegistrationFields::from_map(&map))),
            other => Err(HandlerError::MalformedInput(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Outbound response: status code plus a JSON-encoded body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub body: String,
}

impl GatewayResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status_code: status.as_u16(),
            body: body.to_string(),
        }
    }

    /// `{"success": false, "errors": [...]}`
    pub fn errors<S: AsRef<str>>(status: StatusCode, messages: &[S]) -> Self {
        let messages: Vec<&str> = messages.iter().map(AsRef::as_ref).collect();
        Self::new(
            status,
            serde_json::json!({ "success": false, "errors": messages }),
        )
    }

    /// `{"success": false, "error": "..."}`
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::new(
            status,
            serde_json::json!({ "success": false, "error": message }),
        )
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Decode the body back into JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
