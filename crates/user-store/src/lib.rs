//! Key-value storage for user records.
//!
//! A table maps a unique `username` to a [`UserRecord`]. Backends offer a
//! point read and an atomic conditional write; there are no secondary indexes,
//! no transactions beyond a single item, and no update or delete path.

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::FileUserStore;
pub use memory::MemoryUserStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A persisted user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Primary key
    pub username: String,
    pub email: String,
    /// Stored as received
    pub password: String,
}

impl UserRecord {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The record was written.
    Created,
    /// A record with the same username was already present; nothing was written.
    AlreadyExists,
}

/// Storage collaborator used by the registration handler.
///
/// Implementations must make [`UserStore::put_if_absent`] atomic with respect
/// to other calls on the same store, so two writers racing on one username
/// cannot both observe [`PutOutcome::Created`].
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a record by username.
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Write the record unless one with the same username exists.
    async fn put_if_absent(&self, record: UserRecord) -> Result<PutOutcome, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;
}
