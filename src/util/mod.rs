//! Shared identifier types and serialization helpers.

pub mod ids;
pub mod serde_helpers;

pub use ids::{ConsumerId, MessageId, TaskId, ToolCallId};
pub use serde_helpers::duration_serde;
