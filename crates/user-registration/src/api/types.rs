//! API response types.

use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub table: String,
    /// Absent when the store could not be reached
    pub user_count: Option<usize>,
}
