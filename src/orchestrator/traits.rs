//! The orchestrator contract (§4.3).

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::OrchestratorError;
use crate::message::{QueueMessage, ServiceDefinition, TaskDefinition, TaskResult};

/// A state delta the orchestrator hands back for the control plane to merge
/// into `TaskDefinition.state` (§3 invariant 5: the orchestrator is the sole
/// mutator).
pub type StateDelta = HashMap<String, Value>;

/// Decides, at each step of a task, which service(s) act next (§4.3).
///
/// The orchestrator is the sole owner of task-state *semantics* — it reads
/// and writes whatever keys it likes in `state`; the control plane just
/// persists and forwards the map (§3 invariant 5).
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Decide the next step for `task`, given `candidates` (the services
    /// currently visible per §4.4 retrieval) and the task's current `state`.
    ///
    /// An empty `messages` list whose delta carries a `"result"` key marks
    /// the task terminal (§4.3).
    async fn get_next_messages(
        &self,
        task: &TaskDefinition,
        candidates: &[ServiceDefinition],
        state: &HashMap<String, Value>,
    ) -> Result<(Vec<QueueMessage>, StateDelta), OrchestratorError>;

    /// Incorporate a `TaskResult` into task state before the next decision
    /// point (§4.3).
    fn add_result_to_state(&self, result: &TaskResult, state: &HashMap<String, Value>) -> StateDelta;
}
