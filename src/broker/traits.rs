//! The broker contract every adapter (in-process, HTTP, Kafka, ...) satisfies (§4.1).

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::consumer::Consumer;
use super::error::BrokerError;
use crate::message::QueueMessage;

/// Callback invoked after a message has been durably accepted by `publish`.
pub trait PublishCallback: Send + Sync {
    fn on_published(&self, message: &QueueMessage);
}

impl<F: Fn(&QueueMessage) + Send + Sync> PublishCallback for F {
    fn on_published(&self, message: &QueueMessage) {
        self(message)
    }
}

/// Message broker contract (§4.1): topic-addressed, competing-consumers,
/// at-least-once delivery, FIFO per topic.
///
/// Every concrete broker — the in-process reference, its HTTP-exposed
/// wrapper, and any Kafka/RabbitMQ/Redis/SQS adapter — implements exactly
/// these four operations; the rest of the system depends only on this
/// trait (§9: no inheritance hierarchy required).
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Enqueue `message` on topic `message.type`. Returns once the broker
    /// durably accepts it and has stamped `stats.publish_time`.
    async fn publish(&self, message: QueueMessage) -> Result<(), BrokerError>;

    /// Same as [`publish`](Self::publish), additionally invoking `callback`
    /// after successful acceptance.
    async fn publish_with_callback(
        &self,
        message: QueueMessage,
        callback: &(dyn PublishCallback),
    ) -> Result<(), BrokerError> {
        let to_report = message.clone();
        self.publish(message).await?;
        callback.on_published(&to_report);
        Ok(())
    }

    /// Bind `consumer` to its topic. Fails with
    /// [`BrokerError::DuplicateRegistration`] if an identical `(id,
    /// message_type)` pair is already registered (§4.1).
    async fn register_consumer(&self, consumer: Consumer) -> Result<(), BrokerError>;

    /// Remove a consumer's binding. In-flight deliveries to it are allowed
    /// to complete (§4.1); idempotent if already absent.
    async fn deregister_consumer(&self, message_type: &str, consumer_id: &crate::util::ConsumerId) -> Result<(), BrokerError>;

    /// Current consumer set for a topic, in round-robin order.
    async fn get_consumers(&self, message_type: &str) -> Vec<Consumer>;
}
