//! `ComponentService`: wraps a user-supplied deterministic step function (§4.2).

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use super::contract::{Service, ServiceControl};
use super::error::ServiceError;
use crate::broker::MessageBroker;
use crate::message::{Action, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, TOPIC_CONTROL_PLANE};
use crate::util::TaskId;

/// A deterministic, non-LLM step function: given the current input and
/// state, returns the next output, the updated state, and whether the task
/// is finished (§4.2 "otherwise identical to agent service").
#[async_trait]
pub trait Component: Send + Sync {
    async fn run_step(&self, input: &str, state: &HashMap<String, Value>) -> (String, HashMap<String, Value>, bool);
}

struct ComponentRun {
    input: String,
    state: HashMap<String, Value>,
}

/// Runs one [`Component`] against outstanding tasks, one step per
/// `processing_loop` tick, publishing `COMPLETED_TASK` once `run_step`
/// reports `done` (§4.2).
pub struct ComponentService {
    service_name: String,
    description: String,
    component: Arc<dyn Component>,
    broker: Arc<dyn MessageBroker>,
    runs: DashMap<TaskId, ComponentRun>,
    control: ServiceControl,
}

impl ComponentService {
    pub fn new(
        service_name: impl Into<String>,
        description: impl Into<String>,
        component: Arc<dyn Component>,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            description: description.into(),
            component,
            broker,
            runs: DashMap::new(),
            control: ServiceControl::default(),
        }
    }
}

#[async_trait]
impl Service for ComponentService {
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
                debug!(task_id = %task.task_id, service = %self.service_name, "component task queued");
                self.runs.insert(
                    task.task_id,
                    ComponentRun {
                        input: task.input,
                        state: task.state,
                    },
                );
                Ok(())
            }
            other => {
                warn!(service = %self.service_name, action = %other, "component service ignoring unsupported action");
                Ok(())
            }
        }
    }

    async fn step(&self) -> Result<(), ServiceError> {
        let next = self.runs.iter().next().map(|e| *e.key());
        let Some(task_id) = next else {
            return Ok(());
        };
        let (input, state) = match self.runs.get(&task_id) {
            Some(run) => (run.input.clone(), run.state.clone()),
            None => return Ok(()),
        };

        let (output, new_state, done) = self.component.run_step(&input, &state).await;

        if done {
            info!(task_id = %task_id, service = %self.service_name, "component task complete");
            let result = TaskResult::ok(task_id, output).with_data(serde_json::to_value(&new_state)?);
            let message = QueueMessage::with_payload(self.service_name.clone(), TOPIC_CONTROL_PLANE, Action::CompletedTask, &result)?;
            self.broker.publish(message).await?;
            self.runs.remove(&task_id);
        } else if let Some(mut run) = self.runs.get_mut(&task_id) {
            run.input = output;
            run.state = new_state;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::broker::{Consumer, HandlerFn, InMemoryBroker};
    use crate::util::ConsumerId;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    struct UppercaseOnce;

    #[async_trait]
    impl Component for UppercaseOnce {
        async fn run_step(&self, input: &str, state: &HashMap<String, Value>) -> (String, HashMap<String, Value>, bool) {
            (input.to_uppercase(), state.clone(), true)
        }
    }

    #[tokio::test]
    async fn single_step_component_completes_immediately() {
        let in_memory = InMemoryBroker::default();
        let broker: Arc<dyn MessageBroker> = Arc::new(in_memory.clone());
        let service = Arc::new(ComponentService::new("shout", "uppercases input", Arc::new(UppercaseOnce), broker.clone()));

        let results: Arc<AsyncMutex<Vec<TaskResult>>> = Arc::new(AsyncMutex::new(Vec::new()));
        let results_clone = results.clone();
        let handler = Arc::new(HandlerFn(move |m: QueueMessage| {
            let results = results_clone.clone();
            async move {
                results.lock().await.push(m.payload().unwrap());
                Ok(())
            }
        }));
        broker
            .register_consumer(Consumer::local(ConsumerId::new(), TOPIC_CONTROL_PLANE, handler))
            .await
            .unwrap();

        let task = TaskDefinition::new(TaskId::new(), "hello");
        let msg = QueueMessage::with_payload("client", "shout", Action::NewTask, &task).unwrap();
        service.process_message(msg).await.unwrap();
        service.step().await.unwrap();

        let run_handle = in_memory.clone();
        let handle = tokio::spawn(async move { run_handle.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        in_memory.stop();
        handle.await.unwrap();

        let results = results.lock().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result, "HELLO");
    }
}
