//! The reference in-process broker (§4.1).
//!
//! *topic → FIFO queue* and *topic → ordered consumer list*, drained by a
//! single cooperative scheduler loop that round-robins across topics so no
//! one topic can starve the others.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use super::consumer::{Consumer, ConsumerTarget};
use super::error::BrokerError;
use super::traits::MessageBroker;
use crate::message::{dlq_topic, QueueMessage};
use crate::util::ConsumerId;

/// Tuning knobs for retry/backoff and dead-lettering (§4.1, §9.1 `RuntimeConfig`).
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Attempts before a message is dead-lettered to `<topic>.dlq`.
    pub retry_limit: u32,
    /// Base delay for exponential backoff between requeue attempts.
    pub base_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
    /// How long the scheduler sleeps when every topic was empty last pass.
    pub idle_sleep: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            idle_sleep: Duration::from_millis(5),
        }
    }
}

struct Envelope {
    message: QueueMessage,
    attempts: u32,
}

struct Inner {
    queues: DashMap<String, Mutex<VecDeque<Envelope>>>,
    consumers: DashMap<String, Mutex<Vec<Consumer>>>,
    round_robin: DashMap<String, AtomicUsize>,
    running: AtomicBool,
    config: BrokerConfig,
    http: reqwest::Client,
}

/// The reference (in-process) broker from §4.1.
///
/// Cheaply cloneable: clones share the same queues, consumers, and running
/// flag via an inner `Arc`.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl InMemoryBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: DashMap::new(),
                consumers: DashMap::new(),
                round_robin: DashMap::new(),
                running: AtomicBool::new(false),
                config,
                http: reqwest::Client::new(),
            }),
        }
    }

    fn queue_for(&self, topic: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<VecDeque<Envelope>>> {
        self.inner
            .queues
            .entry(topic.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()))
            .downgrade()
    }

    fn enqueue(&self, topic: &str, envelope: Envelope) {
        self.queue_for(topic).lock().push_back(envelope);
    }

    fn reset_round_robin(&self, topic: &str) {
        self.inner
            .round_robin
            .entry(topic.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .store(0, Ordering::SeqCst);
    }

    fn pick_consumer(&self, topic: &str, consumers: &[Consumer]) -> Consumer {
        let counter = self
            .inner
            .round_robin
            .entry(topic.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        let idx = counter.fetch_add(1, Ordering::SeqCst) % consumers.len();
        consumers[idx].clone()
    }

    /// Run the scheduler loop until [`stop`](Self::stop) is called. This is
    /// the "start-consuming" handle of §4.1: every registered consumer
    /// shares this one loop, since delivery is driven centrally, not per
    /// consumer.
    pub async fn run(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
        info!("in-memory broker scheduler starting");
        while self.inner.running.load(Ordering::SeqCst) {
            let topics: Vec<String> = self.inner.queues.iter().map(|e| e.key().clone()).collect();
            let mut delivered_any = false;
            for topic in topics {
                if self.drain_one(&topic).await {
                    delivered_any = true;
                }
            }
            if !delivered_any {
                tokio::time::sleep(self.inner.config.idle_sleep).await;
            }
        }
        info!("in-memory broker scheduler stopped");
    }

    /// Clear the running flag; `run()` exits after draining its current pass.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Attempt to deliver exactly one message on `topic` to one consumer
    /// (competing-consumers, §4.1). Returns `true` if a delivery was
    /// attempted (regardless of outcome).
    async fn drain_one(&self, topic: &str) -> bool {
        let consumers = {
            let Some(entry) = self.inner.consumers.get(topic) else {
                return false;
            };
            let guard = entry.lock();
            if guard.is_empty() {
                return false;
            }
            guard.clone()
        };

        let envelope = {
            let Some(queue) = self.inner.queues.get(topic) else {
                return false;
            };
            let mut guard = queue.lock();
            guard.pop_front()
        };
        let Some(mut envelope) = envelope else {
            return false;
        };

        let consumer = self.pick_consumer(topic, &consumers);
        envelope.message.stats.mark_processing_started();
        let result = self.deliver(&consumer, envelope.message.clone()).await;

        match result {
            Ok(()) => {
                debug!(topic, consumer_id = %consumer.id, "message delivered");
            }
            Err(err) => {
                envelope.attempts += 1;
                warn!(topic, attempts = envelope.attempts, %err, "delivery failed");
                if envelope.attempts >= self.inner.config.retry_limit {
                    let dead_letter_topic = dlq_topic(topic);
                    warn!(topic, dead_letter_topic, "dead-lettering after exhausted retries");
                    self.enqueue(
                        &dead_letter_topic,
                        Envelope {
                            message: envelope.message,
                            attempts: 0,
                        },
                    );
                } else {
                    let delay = backoff_delay(
                        envelope.attempts,
                        self.inner.config.base_delay,
                        self.inner.config.max_delay,
                    );
                    let this = self.clone();
                    let topic = topic.to_string();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        this.enqueue(&topic, envelope);
                    });
                }
            }
        }
        true
    }

    async fn deliver(&self, consumer: &Consumer, message: QueueMessage) -> Result<(), BrokerError> {
        match &consumer.target {
            ConsumerTarget::Local(handler) => handler.handle(message).await,
            ConsumerTarget::Remote { callback_url } => {
                let response = self
                    .inner
                    .http
                    .post(callback_url)
                    .json(&message)
                    .send()
                    .await
                    .map_err(|e| BrokerError::TransientNetwork(e.to_string()))?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(BrokerError::DeliveryFailed {
                        topic: message.r#type.clone(),
                        attempts: 1,
                        reason: format!("remote consumer returned {}", response.status()),
                    })
                }
            }
        }
    }
}

/// Exponential backoff, doubling per attempt and capped at `max_delay`.
fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
    base.saturating_mul(factor).min(max)
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, mut message: QueueMessage) -> Result<(), BrokerError> {
        message.stats.mark_published();
        let topic = message.r#type.clone();
        debug!(topic, action = %message.action, "publishing message");
        self.enqueue(&topic, Envelope { message, attempts: 0 });
        Ok(())
    }

    async fn register_consumer(&self, consumer: Consumer) -> Result<(), BrokerError> {
        let topic = consumer.message_type.clone();
        {
            let entry = self
                .inner
                .consumers
                .entry(topic.clone())
                .or_insert_with(|| Mutex::new(Vec::new()));
            let mut guard = entry.lock();
            if guard.iter().any(|c| c.id == consumer.id) {
                return Err(BrokerError::DuplicateRegistration {
                    consumer_id: consumer.id.to_string(),
                    topic,
                });
            }
            guard.push(consumer);
        }
        self.reset_round_robin(&topic);
        // Ensure the topic's queue exists so get_consumers/publish agree on its presence.
        self.inner.queues.entry(topic).or_insert_with(|| Mutex::new(VecDeque::new()));
        Ok(())
    }

    async fn deregister_consumer(&self, message_type: &str, consumer_id: &ConsumerId) -> Result<(), BrokerError> {
        if let Some(entry) = self.inner.consumers.get(message_type) {
            entry.lock().retain(|c| &c.id != consumer_id);
        }
        self.reset_round_robin(message_type);
        Ok(())
    }

    async fn get_consumers(&self, message_type: &str) -> Vec<Consumer> {
        self.inner
            .consumers
            .get(message_type)
            .map(|entry| entry.lock().clone())
            .unwrap_or_default()
    }
}
