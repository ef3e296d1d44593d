//! User registration service.
//!
//! Accepts a registration request, validates `username`, `email` and
//! `password`, rejects duplicate usernames and persists the record to a user
//! table. Lookups return the stored user with the password redacted.
//!
//! The [`handler::RegistrationHandler`] works on gateway envelopes and is
//! transport-agnostic; [`api`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod validation;

pub use config::Config;
pub use envelope::{Envelope, GatewayResponse, Request};
pub use error::HandlerError;
pub use handler::{PublicUser, RegistrationHandler};
pub use validation::{validate, RegistrationFields};
