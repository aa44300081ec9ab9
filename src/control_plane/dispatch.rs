//! The control plane proper (§4.4): owns the dispatch algorithm, completion
//! handling, and the per-`task_id` serialization that keeps concurrent
//! `COMPLETED_TASK` deliveries and client submissions from racing on the
//! same task's state.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

// Layer 3: Internal module imports
use super::error::ControlPlaneError;
use super::registry::ServiceRegistry;
use super::task_store::{PersistedTask, TaskStatus, TaskStore};
use crate::broker::{Consumer, ConsumerHandler, MessageBroker};
use crate::message::{Action, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, TOPIC_CONTROL_PLANE, TOPIC_HUMAN};
use crate::orchestrator::Orchestrator;
use crate::util::{ConsumerId, TaskId};

/// The orchestration hub (§4.4): accepts new tasks, asks the configured
/// [`Orchestrator`] what should happen next, publishes the resulting
/// messages, and reconciles `COMPLETED_TASK` replies back into task state.
pub struct ControlPlane {
    registry: ServiceRegistry,
    tasks: TaskStore,
    orchestrator: Arc<dyn Orchestrator>,
    broker: Arc<dyn MessageBroker>,
    task_locks: DashMap<TaskId, Arc<Mutex<()>>>,
}

impl ControlPlane {
    pub fn new(registry: ServiceRegistry, tasks: TaskStore, orchestrator: Arc<dyn Orchestrator>, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            registry,
            tasks,
            orchestrator,
            broker,
            task_locks: DashMap::new(),
        }
    }

    pub async fn register_service(&self, definition: ServiceDefinition) -> Result<(), ControlPlaneError> {
        self.registry.register(definition).await
    }

    pub async fn deregister_service(&self, service_name: &str) -> Result<(), ControlPlaneError> {
        self.registry.deregister(service_name).await
    }

    pub fn list_services(&self) -> Vec<ServiceDefinition> {
        self.registry.list()
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Option<PersistedTask>, ControlPlaneError> {
        self.tasks.get(task_id).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<PersistedTask>, ControlPlaneError> {
        self.tasks.list().await
    }

    /// `GET /tasks/{task_id}/result` (§6): `None` while the task is still
    /// in flight.
    pub async fn get_result(&self, task_id: TaskId) -> Result<Option<TaskResult>, ControlPlaneError> {
        let Some(persisted) = self.tasks.get(task_id).await? else {
            return Ok(None);
        };
        if !persisted.status.is_terminal() {
            return Ok(None);
        }
        let text = persisted.task.state.get("result").and_then(Value::as_str).unwrap_or_default().to_string();
        let result = TaskResult::ok(task_id, text).with_data(serde_json::to_value(&persisted.task.state)?);
        let result = if persisted.status == TaskStatus::Failed { TaskResult { is_error: true, ..result } } else { result };
        Ok(Some(result))
    }

    async fn task_lock(&self, task_id: TaskId) -> Arc<Mutex<()>> {
        self.task_locks.entry(task_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// `POST /tasks` (§6): accept a brand-new task and run it through the
    /// dispatch algorithm for the first time.
    pub async fn submit_task(&self, task: TaskDefinition) -> Result<(), ControlPlaneError> {
        let lock = self.task_lock(task.task_id).await;
        let _guard = lock.lock().await;
        self.dispatch_locked(task).await
    }

    /// `COMPLETED_TASK` delivery handler: resolve which parent task this
    /// result belongs to (direct match for the pipeline orchestrator's
    /// same-task_id chain, or a `pending_sub_tasks` lookup for the agent
    /// orchestrator's sub-tasks — §9 resolved Open Question), fold it into
    /// that task's state, and dispatch again.
    pub async fn handle_completed_task(&self, result: TaskResult) -> Result<(), ControlPlaneError> {
        let Some(parent_id) = self.resolve_parent(result.task_id).await? else {
            warn!(task_id = %result.task_id, "completed task references an unknown task_id; dropping");
            return Ok(());
        };
        let lock = self.task_lock(parent_id).await;
        let _guard = lock.lock().await;

        let Some(persisted) = self.tasks.get(parent_id).await? else {
            return Err(ControlPlaneError::TaskNotFound(parent_id));
        };
        if persisted.status.is_terminal() {
            // A task never leaves a terminal status once recorded (§4.4 invariant).
            return Ok(());
        }
        let mut task = persisted.task;
        let delta = self.orchestrator.add_result_to_state(&result, &task.state);
        task.merge_state(delta);
        self.dispatch_locked(task).await
    }

    async fn resolve_parent(&self, task_id: TaskId) -> Result<Option<TaskId>, ControlPlaneError> {
        if self.tasks.get(task_id).await?.is_some() {
            return Ok(Some(task_id));
        }
        for persisted in self.tasks.list().await? {
            let matches = persisted
                .task
                .state
                .get("pending_sub_tasks")
                .and_then(Value::as_object)
                .is_some_and(|pending| pending.contains_key(&task_id.to_string()));
            if matches {
                return Ok(Some(persisted.task.task_id));
            }
        }
        Ok(None)
    }

    /// The dispatch algorithm proper (§4.4): persist, fetch candidates, ask
    /// the orchestrator, then either publish its messages or finalize the
    /// task. Callers must already hold `task.task_id`'s lock.
    async fn dispatch_locked(&self, mut task: TaskDefinition) -> Result<(), ControlPlaneError> {
        self.tasks.put(&task, TaskStatus::Dispatched).await?;
        let candidates = self.registry.candidates(&task.input).await;

        match self.orchestrator.get_next_messages(&task, &candidates, &task.state).await {
            Ok((messages, delta)) => {
                task.merge_state(delta);
                if messages.is_empty() && task.is_terminal() {
                    let text = task.state.get("result").and_then(Value::as_str).unwrap_or_default().to_string();
                    self.tasks.put(&task, TaskStatus::Completed).await?;
                    let result = TaskResult::ok(task.task_id, text);
                    self.publish_to_human(&result).await?;
                } else if messages.is_empty() {
                    // Not terminal yet but nothing to dispatch: waiting on an
                    // outstanding sub-task or human response already in flight.
                    self.tasks.put(&task, TaskStatus::InProgress).await?;
                } else {
                    self.tasks.put(&task, TaskStatus::InProgress).await?;
                    for message in messages {
                        self.broker.publish(message).await?;
                    }
                }
                Ok(())
            }
            Err(err) => {
                warn!(task_id = %task.task_id, error = %err, "orchestrator failed to decide next step");
                task.state.insert("result".to_string(), Value::from(err.to_string()));
                self.tasks.put(&task, TaskStatus::Failed).await?;
                let result = TaskResult::error(task.task_id, err.to_string());
                self.publish_to_human(&result).await?;
                Ok(())
            }
        }
    }

    async fn publish_to_human(&self, result: &TaskResult) -> Result<(), ControlPlaneError> {
        let message = QueueMessage::with_payload(TOPIC_CONTROL_PLANE, TOPIC_HUMAN, Action::CompletedTask, result)?;
        self.broker.publish(message).await?;
        Ok(())
    }
}

struct ControlPlaneHandler(Arc<ControlPlane>);

#[async_trait]
impl ConsumerHandler for ControlPlaneHandler {
    async fn handle(&self, message: QueueMessage) -> Result<(), crate::broker::BrokerError> {
        match message.action {
            Action::CompletedTask => {
                let result: TaskResult = message
                    .payload()
                    .map_err(|e| crate::broker::BrokerError::ConsumerHandlerFailed(e.to_string()))?;
                self.0
                    .handle_completed_task(result)
                    .await
                    .map_err(|e| crate::broker::BrokerError::ConsumerHandlerFailed(e.to_string()))
            }
            other => {
                warn!(action = %other, "control plane ignoring unsupported action on its own topic");
                Ok(())
            }
        }
    }
}

/// Binds `control_plane` as the consumer of the reserved `"control_plane"`
/// topic, so `COMPLETED_TASK` replies from services reach
/// [`ControlPlane::handle_completed_task`].
pub fn as_consumer(control_plane: Arc<ControlPlane>) -> Consumer {
    Consumer::local(ConsumerId::new(), TOPIC_CONTROL_PLANE, Arc::new(ControlPlaneHandler(control_plane)))
}

/// Registers `control_plane`'s consumer on `broker` (§4.1, §4.4).
pub async fn register_to_message_queue(control_plane: Arc<ControlPlane>, broker: &dyn MessageBroker) -> Result<(), ControlPlaneError> {
    broker.register_consumer(as_consumer(control_plane)).await?;
    Ok(())
}
