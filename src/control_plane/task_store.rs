//! Task store (§4.4, §6): the `tasks` collection, tracking each task's
//! current [`TaskDefinition`] alongside its [`TaskStatus`].

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::error::ControlPlaneError;
use crate::kv::KvStore;
use crate::message::TaskDefinition;
use crate::util::TaskId;

/// Where a task sits in the state machine (§4.4 task lifecycle diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Just handed to the orchestrator; awaiting its decision.
    Dispatched,
    /// Messages were published for one or more services; waiting on a
    /// `COMPLETED_TASK` before the orchestrator decides again.
    InProgress,
    /// Terminal: the orchestrator recorded a `result` key.
    Completed,
    /// Terminal: the orchestrator errored and could not decide.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A task's current definition (including orchestrator state) plus its
/// lifecycle status, as persisted in the `tasks` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedTask {
    pub task: TaskDefinition,
    pub status: TaskStatus,
}

/// Thin wrapper over [`KvStore`] for the `tasks` collection.
pub struct TaskStore {
    kv: Arc<dyn KvStore>,
}

impl TaskStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn put(&self, task: &TaskDefinition, status: TaskStatus) -> Result<(), ControlPlaneError> {
        let persisted = PersistedTask { task: task.clone(), status };
        self.kv.put("tasks", &task.task_id.to_string(), serde_json::to_value(&persisted)?).await?;
        Ok(())
    }

    pub async fn get(&self, task_id: TaskId) -> Result<Option<PersistedTask>, ControlPlaneError> {
        match self.kv.get("tasks", &task_id.to_string()).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<PersistedTask>, ControlPlaneError> {
        self.kv
            .list_prefix("tasks")
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(ControlPlaneError::from))
            .collect()
    }
}
