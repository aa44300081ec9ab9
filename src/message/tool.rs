//! Tool-invocation envelope: `ToolCall` / `ToolCallResult` / `ToolCallBundle` (§3).

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::util::ToolCallId;

/// A single RPC-like invocation of a named tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    /// Topic to publish the `ToolCallResult` back to.
    pub source_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl ToolCall {
    pub fn new(source_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            id: ToolCallId::new(),
            source_id: source_id.into(),
            tool_name: tool_name.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }
}

/// The outcome of running a `ToolCall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: ToolCallId,
    pub tool_name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn ok(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            id: call.id,
            tool_name: call.tool_name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            id: call.id,
            tool_name: call.tool_name.clone(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// A group of tool calls an agent step wants executed together, mirroring
/// the source system's bundling of multiple tool invocations from one LLM
/// turn (parallel tool calls).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolCallBundle {
    pub tool_calls: Vec<ToolCall>,
}

impl ToolCallBundle {
    pub fn new(tool_calls: Vec<ToolCall>) -> Self {
        Self { tool_calls }
    }

    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty()
    }
}
