//! `TaskDefinition` and `TaskResult` (§3).

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::chat::ChatMessage;
use crate::util::TaskId;

/// A request submitted to the control plane.
///
/// `state` is owned exclusively by the orchestrator (§3 invariant 5) — the
/// control plane only persists and forwards it, never interprets its keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_id: TaskId,
    pub input: String,
    /// Caller-expressed preference for which service should handle this.
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub state: HashMap<String, Value>,
}

impl TaskDefinition {
    /// A fresh task with a client-chosen id and empty orchestrator state.
    pub fn new(task_id: TaskId, input: impl Into<String>) -> Self {
        Self {
            task_id,
            input: input.into(),
            agent_id: None,
            state: HashMap::new(),
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Merge a state delta produced by the orchestrator into `self.state`.
    pub fn merge_state(&mut self, delta: HashMap<String, Value>) {
        self.state.extend(delta);
    }

    /// `true` once the orchestrator has recorded a terminal `result` key.
    pub fn is_terminal(&self) -> bool {
        self.state.contains_key("result")
    }
}

/// The outcome of a service processing one task (or sub-task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub result: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub data: Option<Value>,
    /// Set when the producing service failed rather than completed (§7).
    #[serde(default)]
    pub is_error: bool,
}

impl TaskResult {
    pub fn ok(task_id: TaskId, result: impl Into<String>) -> Self {
        Self {
            task_id,
            result: result.into(),
            history: Vec::new(),
            data: None,
            is_error: false,
        }
    }

    pub fn error(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            result: reason.into(),
            history: Vec::new(),
            data: None,
            is_error: true,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
