//! Control plane error taxonomy (§7).

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::broker::BrokerError;
use crate::kv::KvError;
use crate::orchestrator::OrchestratorError;
use crate::util::TaskId;

/// Failures surfaced by [`super::dispatch::ControlPlane`] (§4.4, §7).
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// `GET /tasks/{task_id}` or completion handling referenced a task_id
    /// the task store has never seen.
    #[error("unknown task: {0}")]
    TaskNotFound(TaskId),

    /// `POST /services/deregister` named a service that isn't registered.
    #[error("unknown service: {0}")]
    ServiceNotFound(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ControlPlaneError {
    /// Whether the caller should retry the operation (§7).
    pub fn is_transient(&self) -> bool {
        matches!(self, ControlPlaneError::Broker(e) if e.is_transient())
    }

    /// Whether this should escalate to the launcher rather than be reported
    /// back to the caller as a normal task failure (§7 category 7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ControlPlaneError::Broker(e) if e.is_fatal())
    }
}
