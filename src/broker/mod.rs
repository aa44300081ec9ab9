//! The message broker: topic-addressed, competing-consumers, at-least-once (§4.1).
//!
//! - [`MessageBroker`]: the four-operation contract every adapter satisfies.
//! - [`InMemoryBroker`]: the reference implementation — FIFO-per-topic
//!   queues drained by a single round-robin scheduler loop.
//! - [`http`]: an axum router exposing an [`InMemoryBroker`] to out-of-process
//!   callers, plus the remote-consumer delivery path used by the broker
//!   itself.
//!
//! Kafka/RabbitMQ/Redis/SQS adapters are out of scope (§1); anything
//! implementing [`MessageBroker`] plugs into the control plane and services
//! unchanged (§9).

pub mod consumer;
pub mod error;
pub mod http;
pub mod in_memory;
pub mod traits;

pub use consumer::{Consumer, ConsumerHandler, ConsumerTarget, HandlerFn};
pub use error::BrokerError;
pub use in_memory::{BrokerConfig, InMemoryBroker};
pub use traits::{MessageBroker, PublishCallback};
