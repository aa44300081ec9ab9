//! Broker error taxonomy (§7).

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Failure modes surfaced by the [`MessageBroker`](super::traits::MessageBroker) contract.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// `register_consumer` was called with an `(id, message_type)` pair
    /// that is already bound (§4.1, §7 category 5).
    #[error("consumer {consumer_id} already registered on topic {topic}")]
    DuplicateRegistration { consumer_id: String, topic: String },

    /// `publish` targeted a topic with no known owner (§3 invariant 2).
    /// The reference broker does not actually reject these — it queues them
    /// FIFO pending a future consumer — but remote adapters may use this to
    /// signal an unroutable topic outright.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// A remote consumer's HTTP callback failed to accept delivery (§4.1,
    /// §7 category 2). Carries the attempt count so callers can decide
    /// whether to dead-letter.
    #[error("delivery to {topic} failed after {attempts} attempt(s): {reason}")]
    DeliveryFailed {
        topic: String,
        attempts: u32,
        reason: String,
    },

    /// Transient network failure at the publish boundary (§7 category 1).
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The broker's background scheduler is not running.
    #[error("broker is not running")]
    NotRunning,

    /// A registered handler raised an error while processing a delivered
    /// message (§7 category 2); the broker requeues up to the retry limit.
    #[error("consumer handler failed: {0}")]
    ConsumerHandlerFailed(String),
}

impl BrokerError {
    /// Whether a caller should retry this operation with backoff (§7).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::TransientNetwork(_)
                | BrokerError::DeliveryFailed { .. }
                | BrokerError::ConsumerHandlerFailed(_)
        )
    }

    /// Whether this error should escalate to the launcher rather than be
    /// logged-and-continued (§7 category 7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrokerError::NotRunning)
    }
}
