//! File-backed user table with optional AES-256-GCM encryption.

use crate::{PutOutcome, StoreError, UserRecord, UserStore};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use async_trait::async_trait;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Nonce size for AES-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// On-disk schema version.
const DATA_VERSION: u32 = 1;

#[derive(Serialize)]
struct TableFileRef<'a> {
    version: u32,
    table: &'a str,
    records: &'a HashMap<String, UserRecord>,
}

#[derive(Deserialize)]
struct TableFile {
    version: u32,
    records: HashMap<String, UserRecord>,
}

/// User table persisted as a single file per table.
///
/// The whole table is held in memory and rewritten on every insert. Writes go
/// to a temp file that is renamed over the table file, so a crash mid-write
/// leaves the previous contents intact.
///
/// File format: plain JSON, or `[12 bytes nonce][ciphertext with auth tag]`
/// when a passphrase is configured.
pub struct FileUserStore {
    writer: TableWriter,
    records: Arc<RwLock<HashMap<String, UserRecord>>>,
}

/// Where and how the table is written.
#[derive(Clone)]
struct TableWriter {
    table: String,
    path: PathBuf,
    key: Option<[u8; 32]>,
}

impl FileUserStore {
    /// Open (or create) the table under `data_dir`.
    ///
    /// A missing file yields an empty table. A file that fails to decrypt or
    /// parse is an error, never silently discarded.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        table: impl Into<String>,
        passphrase: Option<&SecretString>,
    ) -> Result<Self, StoreError> {
        let table = table.into();
        let key = passphrase.map(|p| derive_key(p, &table));
        let extension = if key.is_some() { "enc" } else { "json" };
        let path = data_dir.as_ref().join(format!("{}.{}", table, extension));

        if let Some(key) = &key {
            info!(table = %table, key_id = %key_fingerprint(key), "Table encryption enabled");
        }

        let records = load(&path, key.as_ref()).await?;
        info!(
            table = %table,
            path = ?path,
            records = records.len(),
            "File user store opened"
        );

        Ok(Self {
            writer: TableWriter { table, path, key },
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Location of the table file.
    pub fn path(&self) -> &Path {
        &self.writer.path
    }
}

impl TableWriter {
    async fn persist(&self, records: &HashMap<String, UserRecord>) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(&TableFileRef {
            version: DATA_VERSION,
            table: &self.table,
            records,
        })?;

        let data = match &self.key {
            Some(key) => encrypt(&plaintext, key)?,
            None => plaintext,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(bytes = data.len(), path = ?self.path, "Saved user table");
        Ok(())
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(username).cloned())
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<PutOutcome, StoreError> {
        // Held across the file write so the existence check and insert are atomic.
        let mut records = self.records.clone().write_owned().await;
        if records.contains_key(&record.username) {
            return Ok(PutOutcome::AlreadyExists);
        }

        // Once started, the write runs to completion in its own task even if
        // the caller stops waiting. Memory is only updated after the file is
        // committed, so the two never disagree.
        let writer = self.writer.clone();
        let write = tokio::spawn(async move {
            let username = record.username.clone();
            let mut next = HashMap::clone(&records);
            next.insert(username.clone(), record);

            if let Err(e) = writer.persist(&next).await {
                error!(
                    table = %writer.table,
                    %username,
                    error = %e,
                    "Failed to persist user table, insert discarded"
                );
                return Err(e);
            }

            *records = next;
            Ok(PutOutcome::Created)
        });

        write
            .await
            .map_err(|e| StoreError::Unavailable(format!("table write task failed: {}", e)))?
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}

/// Derive the table key: SHA256(passphrase || table).
fn derive_key(passphrase: &SecretString, table: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.expose_secret().as_bytes());
    hasher.update(table.as_bytes());
    let hash = hasher.finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(&hash);
    key
}

/// Short non-reversible identifier for a key, safe to log.
fn key_fingerprint(key: &[u8; 32]) -> String {
    let digest = Sha256::digest(key);
    hex::encode(&digest[..4])
}

async fn load(
    path: &Path,
    key: Option<&[u8; 32]>,
) -> Result<HashMap<String, UserRecord>, StoreError> {
    if !fs::try_exists(path).await? {
        info!(path = ?path, "Table file not found, starting with empty table");
        return Ok(HashMap::new());
    }

    let data = fs::read(path).await?;
    let plaintext = match key {
        Some(key) => decrypt(&data, key)?,
        None => data,
    };

    let file: TableFile = serde_json::from_slice(&plaintext)?;
    if file.version > DATA_VERSION {
        return Err(StoreError::Unavailable(format!(
            "unsupported table file version {} (max {})",
            file.version, DATA_VERSION
        )));
    }

    Ok(file.records)
}

fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, StoreError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher.encrypt(nonce, plaintext)?;

    let mut data = nonce_bytes.to_vec();
    data.extend(ciphertext);
    Ok(data)
}

fn decrypt(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, StoreError> {
    if data.len() < NONCE_SIZE {
        return Err(StoreError::Encryption("Table file too short".into()));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            StoreError::Encryption(
                "Failed to decrypt table. The passphrase may have changed.".to_string(),
            )
        })
}
