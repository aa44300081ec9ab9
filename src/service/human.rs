//! `HumanService`: presents outstanding tasks to a human (§4.2).

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use super::contract::{Service, ServiceControl};
use super::error::ServiceError;
use crate::broker::MessageBroker;
use crate::message::{Action, ChatMessage, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, TOPIC_CONTROL_PLANE};
use crate::util::TaskId;

/// Source of human answers. Local mode blocks on this directly from
/// `step()`; server mode instead routes answers through
/// [`HumanService::provide_answer`] (fed by `POST /tasks/{id}/handle`, §6)
/// and `ask` is never called.
#[async_trait]
pub trait HumanInput: Send + Sync {
    async fn ask(&self, task: &TaskDefinition) -> Option<String>;
}

/// Deterministic test/demo [`HumanInput`] that replays a fixed queue of
/// answers, mirroring [`crate::orchestrator::ScriptedLlmClient`].
pub struct ScriptedHumanInput {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedHumanInput {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl HumanInput for ScriptedHumanInput {
    async fn ask(&self, _task: &TaskDefinition) -> Option<String> {
        self.responses.lock().pop_front()
    }
}

/// Holds tasks awaiting a human response and publishes `COMPLETED_TASK` with
/// `role = user` content once one arrives (§4.2).
pub struct HumanService {
    service_name: String,
    description: String,
    broker: Arc<dyn MessageBroker>,
    input: Option<Arc<dyn HumanInput>>,
    pending: DashMap<TaskId, TaskDefinition>,
    control: ServiceControl,
}

impl HumanService {
    pub fn new(service_name: impl Into<String>, description: impl Into<String>, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            service_name: service_name.into(),
            description: description.into(),
            broker,
            input: None,
            pending: DashMap::new(),
            control: ServiceControl::default(),
        }
    }

    /// Drive `step()` from a [`HumanInput`] (local mode) instead of waiting
    /// for an external `provide_answer` call.
    pub fn with_input(mut self, input: Arc<dyn HumanInput>) -> Self {
        self.input = Some(input);
        self
    }

    /// Server-mode entry point for `POST /tasks/{id}/handle` (§6): supplies
    /// the answer for a pending task out of band.
    pub async fn provide_answer(&self, task_id: TaskId, answer: impl Into<String>) -> Result<(), ServiceError> {
        let (_, task) = self.pending.remove(&task_id).ok_or_else(|| ServiceError::UnknownTask(task_id.to_string()))?;
        self.publish_answer(task.task_id, answer.into()).await
    }

    async fn publish_answer(&self, task_id: TaskId, answer: String) -> Result<(), ServiceError> {
        info!(task_id = %task_id, service = %self.service_name, "human answered task");
        let result = TaskResult::ok(task_id, answer.clone()).with_history(vec![ChatMessage::user(answer)]);
        let message = QueueMessage::with_payload(self.service_name.clone(), TOPIC_CONTROL_PLANE, Action::CompletedTask, &result)?;
        self.broker.publish(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Service for HumanService {
    fn service_definition(&self) -> ServiceDefinition {
        ServiceDefinition::new(self.service_name.clone(), self.description.clone())
    }

    fn control(&self) -> &ServiceControl {
        &self.control
    }

    async fn process_message(&self, message: QueueMessage) -> Result<(), ServiceError> {
        match message.action {
            Action::NewTask => {
                let task: TaskDefinition = message.payload()?;
                debug!(task_id = %task.task_id, service = %self.service_name, "task awaiting human response");
                self.pending.insert(task.task_id, task);
                Ok(())
            }
            other => {
                warn!(service = %self.service_name, action = %other, "human service ignoring unsupported action");
                Ok(())
            }
        }
    }

    async fn step(&self) -> Result<(), ServiceError> {
        let Some(input) = &self.input else {
            return Ok(());
        };
        let next = self.pending.iter().next().map(|e| *e.key());
        let Some(task_id) = next else {
            return Ok(());
        };
        let task = self.pending.get(&task_id).map(|t| t.clone());
        let Some(task) = task else {
            return Ok(());
        };

        if let Some(answer) = input.ask(&task).await {
            self.pending.remove(&task_id);
            self.publish_answer(task_id, answer).await?;
        }
        Ok(())
    }
}
