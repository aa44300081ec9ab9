//! `QueueMessage`: the wire envelope every broker topic carries (§3, §6).

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::action::Action;
use super::stats::MessageStats;
use crate::util::MessageId;

/// Reserved topic name for the control plane.
pub const TOPIC_CONTROL_PLANE: &str = "control_plane";
/// Reserved topic name for the terminal human-facing channel.
pub const TOPIC_HUMAN: &str = "human";

/// Returns the dead-letter sibling topic for `topic` (`"<topic>.dlq"`).
pub fn dlq_topic(topic: &str) -> String {
    format!("{topic}.dlq")
}

/// The message broker's wire envelope.
///
/// Immutable after publish except for `stats` (§3 invariant 2). `data` is an
/// untyped JSON payload; producers and consumers agree out-of-band (by
/// `r#type` + `action`) on its shape — `TaskDefinition`, `TaskResult`,
/// `ToolCall`, `ToolCallResult`, etc. This mirrors the source system's
/// `QueueMessage.data: dict[str, Any]` (§9: no dynamic-dispatch-by-class).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique id of this envelope.
    pub id: MessageId,
    /// Who published this message (a service name, or `"client"`).
    pub publisher_id: String,
    /// Destination topic: a service name, or `"control_plane"` / `"human"`.
    #[serde(rename = "type")]
    pub r#type: String,
    /// What the recipient is being asked to do.
    pub action: Action,
    /// Structured payload, shape implied by `(type, action)`.
    pub data: Value,
    /// Publish/process timestamps.
    #[serde(default)]
    pub stats: MessageStats,
}

impl QueueMessage {
    /// Build a new envelope bound for `topic`. `stats` starts empty; the
    /// broker stamps `publish_time` when `publish()` durably accepts it.
    pub fn new(
        publisher_id: impl Into<String>,
        topic: impl Into<String>,
        action: Action,
        data: Value,
    ) -> Self {
        Self {
            id: MessageId::new(),
            publisher_id: publisher_id.into(),
            r#type: topic.into(),
            action,
            data,
            stats: MessageStats::new(),
        }
    }

    /// Serialize `payload` into `data` via serde, returning a new envelope.
    pub fn with_payload<T: Serialize>(
        publisher_id: impl Into<String>,
        topic: impl Into<String>,
        action: Action,
        payload: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(publisher_id, topic, action, serde_json::to_value(payload)?))
    }

    /// Deserialize `data` into `T`.
    pub fn payload<T: for<'de> Deserialize<'de>>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.data.clone())
    }

    /// The dead-letter topic this message would be routed to if delivery
    /// retries are exhausted.
    pub fn dlq_topic(&self) -> String {
        dlq_topic(&self.r#type)
    }
}

impl fmt::Display for QueueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueMessage(id={}, type={}, action={}, publisher={})",
            self.id, self.r#type, self.action, self.publisher_id
        )
    }
}
