//! Service retrieval index (§4.4): bag-of-words cosine similarity over
//! [`ServiceDefinition::retrieval_document`].
//!
//! Below [`ServiceRegistry`](super::registry::ServiceRegistry)'s threshold,
//! candidates are just every registered service; past it, `top_k` narrows
//! the roster handed to the orchestrator so its prompt doesn't grow
//! unbounded with the deployment's service count.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::message::ServiceDefinition;

/// Term-frequency vector, keyed by lowercased token.
type TermVector = HashMap<String, f64>;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn term_vector(text: &str) -> TermVector {
    let mut vector = TermVector::new();
    for token in tokenize(text) {
        *vector.entry(token).or_insert(0.0) += 1.0;
    }
    vector
}

fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = shorter.iter().filter_map(|(term, weight)| longer.get(term).map(|other| weight * other)).sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Retrieval seam over registered services (§4.4). The reference
/// implementation is the bag-of-words index below; a vector-embedding
/// backend could implement the same trait without touching the registry.
#[async_trait]
pub trait ServiceIndex: Send + Sync {
    async fn upsert(&self, definition: ServiceDefinition);
    async fn remove(&self, service_name: &str);
    async fn top_k(&self, query: &str, k: usize) -> Vec<ServiceDefinition>;
}

/// Cosine-similarity index over term-frequency vectors of each service's
/// retrieval document. No IDF weighting, no stemming — good enough to route
/// a handful of candidates out of a larger roster, not a search engine.
#[derive(Default)]
pub struct BagOfWordsIndex {
    entries: DashMap<String, (ServiceDefinition, TermVector)>,
}

impl BagOfWordsIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceIndex for BagOfWordsIndex {
    async fn upsert(&self, definition: ServiceDefinition) {
        let vector = term_vector(&definition.retrieval_document());
        self.entries.insert(definition.service_name.clone(), (definition, vector));
    }

    async fn remove(&self, service_name: &str) {
        self.entries.remove(service_name);
    }

    async fn top_k(&self, query: &str, k: usize) -> Vec<ServiceDefinition> {
        let query_vector = term_vector(query);
        let mut scored: Vec<(f64, ServiceDefinition)> = self
            .entries
            .iter()
            .map(|entry| {
                let (definition, vector) = entry.value();
                (cosine_similarity(&query_vector, vector), definition.clone())
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(_, definition)| definition).collect()
    }
}
