//! Wire types exchanged through the message broker (§3, §6).
//!
//! - [`QueueMessage`]: the envelope every topic carries.
//! - [`Action`]: what the recipient is being asked to do.
//! - [`TaskDefinition`] / [`TaskResult`]: task request/response payloads.
//! - [`ChatMessage`]: agent conversation turns.
//! - [`ToolCall`] / [`ToolCallResult`] / [`ToolCallBundle`]: tool-invocation payloads.
//! - [`ServiceDefinition`]: routing target and retrieval document.

pub mod action;
pub mod chat;
pub mod envelope;
pub mod service_def;
pub mod stats;
pub mod task;
pub mod tool;

pub use action::Action;
pub use chat::{ChatMessage, ChatRole};
pub use envelope::{dlq_topic, QueueMessage, TOPIC_CONTROL_PLANE, TOPIC_HUMAN};
pub use service_def::ServiceDefinition;
pub use stats::MessageStats;
pub use task::{TaskDefinition, TaskResult};
pub use tool::{ToolCall, ToolCallBundle, ToolCallResult};
