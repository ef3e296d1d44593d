//! Envelope-level tests for the registration handler.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use user_registration::{Envelope, GatewayResponse, RegistrationFields, RegistrationHandler};
use user_store::{FileUserStore, MemoryUserStore, PutOutcome, StoreError, UserRecord, UserStore};

/// Memory store that counts every call.
struct SpyStore {
    inner: MemoryUserStore,
    calls: AtomicUsize,
}

impl SpyStore {
    fn new() -> Self {
        Self {
            inner: MemoryUserStore::new("users"),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for SpyStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.record_call();
        self.inner.get(username).await
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<PutOutcome, StoreError> {
        self.record_call();
        self.inner.put_if_absent(record).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.record_call();
        self.inner.count().await
    }
}

/// Store whose backend always rejects the call.
struct FailingStore;

#[async_trait]
impl UserStore for FailingStore {
    async fn get(&self, _username: &str) -> Result<Option<UserRecord>, StoreError> {
        Err(StoreError::Unavailable(
            "ResourceNotFoundException: table users-prod missing".into(),
        ))
    }

    async fn put_if_absent(&self, _record: UserRecord) -> Result<PutOutcome, StoreError> {
        Err(StoreError::Unavailable(
            "ResourceNotFoundException: table users-prod missing".into(),
        ))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Store that never answers in time.
struct SlowStore;

#[async_trait]
impl UserStore for SlowStore {
    async fn get(&self, _username: &str) -> Result<Option<UserRecord>, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }

    async fn put_if_absent(&self, _record: UserRecord) -> Result<PutOutcome, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(PutOutcome::Created)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Store with a bug.
struct PanickingStore;

#[async_trait]
impl UserStore for PanickingStore {
    async fn get(&self, _username: &str) -> Result<Option<UserRecord>, StoreError> {
        panic!("index out of bounds: the len is 0 but the index is 3")
    }

    async fn put_if_absent(&self, _record: UserRecord) -> Result<PutOutcome, StoreError> {
        panic!("index out of bounds: the len is 0 but the index is 3")
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

fn register_envelope(username: &str, email: &str, password: &str) -> Envelope {
    Envelope::post(
        json!({ "username": username, "email": email, "password": password }).to_string(),
    )
}

fn body(response: &GatewayResponse) -> Value {
    response.json().unwrap()
}

#[tokio::test]
async fn test_valid_registration() {
    let store = Arc::new(MemoryUserStore::new("users"));
    let handler = RegistrationHandler::new(store.clone());

    let response = handler
        .handle(register_envelope("alice", "alice@example.com", "password123"))
        .await;

    assert_eq!(response.status_code, 201);
    assert!(response.body.contains("success"));
    assert!(response.body.contains("alice"));

    let stored = store.get("alice").await.unwrap().unwrap();
    assert_eq!(stored.email, "alice@example.com");
}

#[tokio::test]
async fn test_duplicate_keeps_first_write() {
    let store = Arc::new(MemoryUserStore::new("users"));
    let handler = RegistrationHandler::new(store.clone());

    let first = handler
        .handle(register_envelope("bob", "bob@example.com", "password123"))
        .await;
    let second = handler
        .handle(register_envelope("bob", "bob2@example.com", "password456"))
        .await;

    assert_eq!(first.status_code, 201);
    assert_eq!(second.status_code, 409);
    assert!(second.body.contains("Username already exists"));

    let stored = store.get("bob").await.unwrap().unwrap();
    assert_eq!(
        stored,
        UserRecord::new("bob", "bob@example.com", "password123")
    );
}

#[tokio::test]
async fn test_invalid_inputs_never_touch_store() {
    let store = Arc::new(SpyStore::new());
    let handler = RegistrationHandler::new(store.clone());

    let cases = [
        (
            json!({"email": "bob@example.com", "password": "password123"}),
            vec!["Username is required."],
        ),
        (
            json!({"username": "bob", "email": "bobatexample.com", "password": "password123"}),
            vec!["Valid email is required."],
        ),
        (
            json!({"username": "eve", "email": "eve@example.com", "password": "123"}),
            vec!["Password must be at least 6 characters."],
        ),
        (
            json!({"username": "", "password": "12345"}),
            vec![
                "Username is required.",
                "Valid email is required.",
                "Password must be at least 6 characters.",
            ],
        ),
    ];

    for (data, expected) in cases {
        let response = handler.handle(Envelope::post(data.to_string())).await;

        assert_eq!(response.status_code, 400);
        assert_eq!(body(&response), json!({"success": false, "errors": expected}));
    }

    let response = handler.handle(Envelope::post("not json at all")).await;
    assert_eq!(response.status_code, 400);

    let response = handler.lookup(None).await;
    assert_eq!(response.status_code, 400);

    let response = handler.handle(Envelope::with_method("DELETE")).await;
    assert_eq!(response.status_code, 405);

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_valid_registration_uses_one_store_call() {
    let store = Arc::new(SpyStore::new());
    let handler = RegistrationHandler::new(store.clone());

    let response = handler
        .register(RegistrationFields::new(
            "alice",
            "alice@example.com",
            "password123",
        ))
        .await;

    assert_eq!(response.status_code, 201);
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_lookup_never_returns_password() {
    let store = Arc::new(MemoryUserStore::new("users"));
    store
        .put_if_absent(UserRecord::new("alice", "alice@example.com", "s3cr3t-pass"))
        .await
        .unwrap();
    let handler = RegistrationHandler::new(store);

    let response = handler.handle(Envelope::get("alice")).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(
        body(&response),
        json!({"success": true, "user": {"username": "alice", "email": "alice@example.com"}})
    );
    assert!(!response.body.contains("s3cr3t-pass"));
}

#[tokio::test]
async fn test_lookup_unknown_user() {
    let handler = RegistrationHandler::new(Arc::new(MemoryUserStore::new("users")));

    let response = handler.handle(Envelope::get("ghost")).await;

    assert_eq!(response.status_code, 404);
    assert!(response.body.contains("User not found."));
}

#[tokio::test]
async fn test_concurrent_registrations_single_winner() {
    let store = Arc::new(MemoryUserStore::new("users"));
    let handler = Arc::new(RegistrationHandler::new(store.clone()));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let handler = handler.clone();
        let email = format!("racer{}@example.com", i);
        tasks.push(tokio::spawn(async move {
            let response = handler
                .handle(register_envelope("racer", &email, "password123"))
                .await;
            (response.status_code, email)
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            (201, email) => winners.push(email),
            (409, _) => conflicts += 1,
            (status, _) => panic!("unexpected status {}", status),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 7);
    let stored = store.get("racer").await.unwrap().unwrap();
    assert_eq!(stored.email, winners[0]);
}

#[tokio::test]
async fn test_store_failure_is_database_error() {
    let handler = RegistrationHandler::new(Arc::new(FailingStore));

    let response = handler
        .handle(register_envelope("alice", "alice@example.com", "password123"))
        .await;

    assert_eq!(response.status_code, 500);
    assert_eq!(
        body(&response),
        json!({"success": false, "error": "Database error"})
    );
    assert!(!response.body.contains("ResourceNotFoundException"));

    let response = handler.handle(Envelope::get("alice")).await;
    assert_eq!(response.status_code, 500);
    assert!(!response.body.contains("users-prod"));
}

#[tokio::test]
async fn test_store_timeout_is_database_error() {
    let handler = RegistrationHandler::new(Arc::new(SlowStore))
        .with_store_timeout(Duration::from_millis(20));

    let response = handler
        .handle(register_envelope("alice", "alice@example.com", "password123"))
        .await;
    assert_eq!(response.status_code, 500);
    assert_eq!(body(&response)["error"], "Database error");

    let response = handler.lookup(Some("alice")).await;
    assert_eq!(response.status_code, 500);
    assert_eq!(body(&response)["error"], "Database error");
}

#[tokio::test]
async fn test_panic_is_internal_error() {
    let handler = RegistrationHandler::new(Arc::new(PanickingStore));

    let response = handler
        .handle(register_envelope("alice", "alice@example.com", "password123"))
        .await;

    assert_eq!(response.status_code, 500);
    assert_eq!(
        body(&response),
        json!({"success": false, "error": "Internal server error"})
    );
    assert!(!response.body.contains("index out of bounds"));
}

#[tokio::test]
async fn test_file_backed_registration_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = FileUserStore::open(dir.path(), "users", None).await.unwrap();
        let handler = RegistrationHandler::new(Arc::new(store));
        let response = handler
            .handle(register_envelope("alice", "alice@example.com", "password123"))
            .await;
        assert_eq!(response.status_code, 201);
    }

    let store = FileUserStore::open(dir.path(), "users", None).await.unwrap();
    let handler = RegistrationHandler::new(Arc::new(store));

    let response = handler.handle(Envelope::get("alice")).await;
    assert_eq!(response.status_code, 200);

    let response = handler
        .handle(register_envelope("alice", "other@example.com", "password123"))
        .await;
    assert_eq!(response.status_code, 409);
}

/// Write a plain table file holding `count` users.
fn seed_table(dir: &std::path::Path, count: usize) {
    let records: serde_json::Map<String, Value> = (0..count)
        .map(|i| {
            let username = format!("user{}", i);
            let record = json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "password123",
            });
            (username, record)
        })
        .collect();
    let table = json!({ "version": 1, "table": "users", "records": records });
    std::fs::write(dir.join("users.json"), table.to_string()).unwrap();
}

#[tokio::test]
async fn test_timed_out_registration_leaves_table_consistent() {
    let dir = tempfile::TempDir::new().unwrap();
    seed_table(dir.path(), 3000);
    let store = Arc::new(FileUserStore::open(dir.path(), "users", None).await.unwrap());

    let handler = RegistrationHandler::new(store.clone())
        .with_store_timeout(Duration::from_millis(1));
    let response = handler
        .handle(register_envelope("alice", "alice@example.com", "password123"))
        .await;
    assert!(
        matches!(response.status_code, 201 | 500),
        "unexpected status {}",
        response.status_code
    );

    // Blocks until any in-flight write has released the table.
    let in_memory = store.get("alice").await.unwrap();
    let reopened = FileUserStore::open(dir.path(), "users", None).await.unwrap();
    let on_disk = reopened.get("alice").await.unwrap();
    assert_eq!(in_memory, on_disk);

    let retry = RegistrationHandler::new(store.clone())
        .handle(register_envelope("alice", "alice@example.com", "password123"))
        .await;
    let expected = if in_memory.is_some() { 409 } else { 201 };
    assert_eq!(retry.status_code, expected);
}
