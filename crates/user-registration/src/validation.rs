//! Registration input validation.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use user_store::UserRecord;

pub const USERNAME_REQUIRED: &str = "Username is required.";
pub const EMAIL_INVALID: &str = "Valid email is required.";
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters.";

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Non-empty local part, `@`, then a domain containing a dot.
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+$").expect("email pattern is valid"));

/// Registration fields as received. Non-string values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFields {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl RegistrationFields {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    /// Pick the three fields out of a decoded JSON object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let field = |name: &str| map.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            username: field("username"),
            email: field("email"),
            password: field("password"),
        }
    }

    /// Build the record to persist, or the validation messages.
    pub fn into_record(self) -> Result<UserRecord, Vec<String>> {
        let errors = validate(&self);
        match (self.username, self.email, self.password) {
            (Some(username), Some(email), Some(password)) if errors.is_empty() => {
                Ok(UserRecord::new(username, email, password))
            }
            _ => Err(errors),
        }
    }
}

/// Check all rules and collect every violation, in rule order.
pub fn validate(fields: &RegistrationFields) -> Vec<String> {
    let mut errors = Vec::new();

    if fields.username.as_deref().map_or(true, str::is_empty) {
        errors.push(USERNAME_REQUIRED.to_string());
    }

    if !fields.email.as_deref().is_some_and(is_valid_email) {
        errors.push(EMAIL_INVALID.to_string());
    }

    if fields
        .password
        .as_deref()
        .map_or(true, |p| p.chars().count() < MIN_PASSWORD_LENGTH)
    {
        errors.push(PASSWORD_TOO_SHORT.to_string());
    }

    errors
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}
