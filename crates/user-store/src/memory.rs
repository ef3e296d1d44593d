//! In-memory user table.

use crate::{PutOutcome, StoreError, UserRecord, UserStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Volatile user table, lost on restart.
#[derive(Debug)]
pub struct MemoryUserStore {
    table: String,
    records: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    /// Create an empty table.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        info!(table = %table, "In-memory user store initialized");
        Self {
            table,
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(username).cloned())
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<PutOutcome, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.username) {
            return Ok(PutOutcome::AlreadyExists);
        }

        debug!(table = %self.table, username = %record.username, "Inserting user");
        records.insert(record.username.clone(), record);
        Ok(PutOutcome::Created)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}
