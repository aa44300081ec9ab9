//! The key-value store abstraction backing `services`/`tasks` persistence (§6, §9.1).

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure modes for a [`KvStore`] backend.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A pluggable persistence seam for the two collections in §6's "Persisted
/// state layout": `services` and `tasks`. Real backends (a database, a
/// remote KV service) are out of scope (§1); the crate ships one concrete
/// in-memory implementation.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the raw JSON value stored at `collection/key`, if any.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, KvError>;

    /// Upsert `value` at `collection/key`.
    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), KvError>;

    /// Remove `collection/key`, if present. Idempotent.
    async fn delete(&self, collection: &str, key: &str) -> Result<(), KvError>;

    /// List every value currently stored in `collection`.
    async fn list_prefix(&self, collection: &str) -> Result<Vec<Value>, KvError>;
}
