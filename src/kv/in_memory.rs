//! DashMap-backed [`KvStore`] used by both the local launcher and tests.

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

// Layer 3: Internal module imports
use super::traits::{KvError, KvStore};

/// In-memory key-value store: `collection -> (key -> value)`.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    collections: DashMap<String, DashMap<String, Value>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, KvError> {
        Ok(self.collections.get(collection).and_then(|c| c.get(key).map(|v| v.clone())))
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), KvError> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), KvError> {
        if let Some(c) = self.collections.get(collection) {
            c.remove(key);
        }
        Ok(())
    }

    async fn list_prefix(&self, collection: &str) -> Result<Vec<Value>, KvError> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default())
    }
}
