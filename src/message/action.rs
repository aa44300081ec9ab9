//! The action enum carried in every `QueueMessage` (§6).

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

/// What a `QueueMessage` asks its recipient to do.
///
/// Replaces the source system's `isinstance`/class-name dispatch (§9) with a
/// closed enum; handlers switch on `(message.r#type.as_str(), action)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// A new `TaskDefinition` is being handed to a service or the control plane.
    NewTask,
    /// A `TaskResult` is being returned, usually to `"control_plane"`.
    CompletedTask,
    /// A new `ToolCall` is being handed to a tool service.
    NewToolCall,
    /// A `ToolCallResult` is being returned to the calling service's topic.
    CompletedToolCall,
    /// A service is asking a human for help mid-task.
    RequestForHelp,
}

impl Action {
    /// Short machine name, matching the wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::NewTask => "NEW_TASK",
            Action::CompletedTask => "COMPLETED_TASK",
            Action::NewToolCall => "NEW_TOOL_CALL",
            Action::CompletedToolCall => "COMPLETED_TOOL_CALL",
            Action::RequestForHelp => "REQUEST_FOR_HELP",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
