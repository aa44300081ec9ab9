//! Service registry (§4.4): the `services` collection, an in-memory cache,
//! and the retrieval-threshold migration into a [`ServiceIndex`].

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::Mutex;

// Layer 3: Internal module imports
use super::error::ControlPlaneError;
use super::index::ServiceIndex;
use crate::kv::KvStore;
use crate::message::ServiceDefinition;

/// Holds every registered [`ServiceDefinition`], persisted through a
/// [`KvStore`] and cached in a [`DashMap`] for cheap reads.
///
/// Below `threshold` registrations, [`candidates`](Self::candidates) returns
/// the full cache — every service is always "visible", which is exactly
/// right when there are only a handful. Past `threshold`, it instead
/// delegates to `index.top_k`, and crossing the threshold migrates every
/// cached definition into the index under the same write lock that would
/// otherwise let a concurrent registration interleave with the migration
/// (§4.4 "Service retrieval").
pub struct ServiceRegistry {
    kv: Arc<dyn KvStore>,
    cache: DashMap<String, ServiceDefinition>,
    index: Arc<dyn ServiceIndex>,
    threshold: usize,
    top_k: usize,
    write_lock: Mutex<()>,
}

impl ServiceRegistry {
    pub fn new(kv: Arc<dyn KvStore>, index: Arc<dyn ServiceIndex>, threshold: usize, top_k: usize) -> Self {
        Self {
            kv,
            cache: DashMap::new(),
            index,
            threshold,
            top_k,
            write_lock: Mutex::new(()),
        }
    }

    /// Repopulate the cache (and index, if already past threshold) from the
    /// `services` collection. Called once at launch.
    pub async fn load(&self) -> Result<(), ControlPlaneError> {
        let _guard = self.write_lock.lock().await;
        for value in self.kv.list_prefix("services").await? {
            let definition: ServiceDefinition = serde_json::from_value(value)?;
            self.cache.insert(definition.service_name.clone(), definition);
        }
        if self.cache.len() > self.threshold {
            for entry in self.cache.iter() {
                self.index.upsert(entry.value().clone()).await;
            }
        }
        Ok(())
    }

    /// Register (or re-register) a service (§4.4, §6 `POST /services/register`).
    pub async fn register(&self, definition: ServiceDefinition) -> Result<(), ControlPlaneError> {
        let _guard = self.write_lock.lock().await;
        self.kv.put("services", &definition.service_name, serde_json::to_value(&definition)?).await?;
        self.cache.insert(definition.service_name.clone(), definition);
        if self.cache.len() > self.threshold {
            for entry in self.cache.iter() {
                self.index.upsert(entry.value().clone()).await;
            }
        }
        Ok(())
    }

    /// Deregister a service (§6 `POST /services/deregister`). Idempotent in
    /// the backing store; errors only if the cache never had it.
    pub async fn deregister(&self, service_name: &str) -> Result<(), ControlPlaneError> {
        let _guard = self.write_lock.lock().await;
        if self.cache.remove(service_name).is_none() {
            return Err(ControlPlaneError::ServiceNotFound(service_name.to_string()));
        }
        self.kv.delete("services", service_name).await?;
        self.index.remove(service_name).await;
        Ok(())
    }

    pub fn get(&self, service_name: &str) -> Option<ServiceDefinition> {
        self.cache.get(service_name).map(|e| e.value().clone())
    }

    pub fn list(&self) -> Vec<ServiceDefinition> {
        self.cache.iter().map(|e| e.value().clone()).collect()
    }

    /// The candidate roster the orchestrator sees for `query` (§4.4).
    pub async fn candidates(&self, query: &str) -> Vec<ServiceDefinition> {
        if self.cache.len() <= self.threshold {
            self.list()
        } else {
            self.index.top_k(query, self.top_k).await
        }
    }
}
