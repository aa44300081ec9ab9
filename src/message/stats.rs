//! Publish/process timestamps carried on every `QueueMessage`.

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamps tracking a message's journey through the broker.
///
/// The only field of `QueueMessage` that mutates after publish (§3 invariants).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageStats {
    /// Set by the broker the moment `publish()` durably accepts the message.
    pub publish_time: Option<DateTime<Utc>>,
    /// Set by the consumer's delivery path right before the handler runs.
    pub process_start_time: Option<DateTime<Utc>>,
    /// Set right after the handler returns (success or failure).
    pub process_end_time: Option<DateTime<Utc>>,
}

impl MessageStats {
    /// Fresh stats with no timestamps set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `publish_time` with the current time.
    pub fn mark_published(&mut self) {
        self.publish_time = Some(Utc::now());
    }

    /// Stamp `process_start_time` with the current time.
    pub fn mark_processing_started(&mut self) {
        self.process_start_time = Some(Utc::now());
    }

    /// Stamp `process_end_time` with the current time.
    pub fn mark_processing_ended(&mut self) {
        self.process_end_time = Some(Utc::now());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_timestamps() {
        let stats = MessageStats::new();
        assert!(stats.publish_time.is_none());
        assert!(stats.process_start_time.is_none());
        assert!(stats.process_end_time.is_none());
    }

    #[test]
    fn marks_set_timestamps_in_order() {
        let mut stats = MessageStats::new();
        stats.mark_published();
        stats.mark_processing_started();
        stats.mark_processing_ended();

        assert!(stats.publish_time.is_some());
        assert!(stats.process_start_time.unwrap() >= stats.publish_time.unwrap());
        assert!(stats.process_end_time.unwrap() >= stats.process_start_time.unwrap());
    }
}
