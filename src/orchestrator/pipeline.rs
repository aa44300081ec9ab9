//! The deterministic pipeline orchestrator (§4.3).

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

// Layer 3: Internal module imports
use super::error::OrchestratorError;
use super::traits::{Orchestrator, StateDelta};
use crate::message::{Action, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, TOPIC_CONTROL_PLANE};

const STATE_NEXT_INDEX: &str = "next_service_index";
const STATE_LAST_OUTPUT: &str = "last_output";
const STATE_RESULT: &str = "result";

/// Chains a fixed, ordered list of service names: component *n*'s output
/// becomes component *n+1*'s input (§4.3).
///
/// State carries `next_service_index` (how many components have been
/// dispatched so far) and `last_output` (the most recent component's
/// result). Candidate-service retrieval is irrelevant here — the chain is
/// author-specified, not LLM- or similarity-chosen.
pub struct PipelineOrchestrator {
    services: Vec<String>,
}

impl PipelineOrchestrator {
    pub fn new(services: Vec<String>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Orchestrator for PipelineOrchestrator {
    async fn get_next_messages(
        &self,
        task: &TaskDefinition,
        _candidates: &[ServiceDefinition],
        state: &HashMap<String, Value>,
    ) -> Result<(Vec<QueueMessage>, StateDelta), OrchestratorError> {
        if self.services.is_empty() {
            return Err(OrchestratorError::NoEligibleServices);
        }

        let idx = state.get(STATE_NEXT_INDEX).and_then(Value::as_u64).unwrap_or(0) as usize;

        if idx >= self.services.len() {
            let last_output = state
                .get(STATE_LAST_OUTPUT)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| task.input.clone());
            debug!(task_id = %task.task_id, result = %last_output, "pipeline terminal");
            let mut delta = StateDelta::new();
            delta.insert(STATE_RESULT.to_string(), json!(last_output));
            return Ok((Vec::new(), delta));
        }

        let input = if idx == 0 {
            task.input.clone()
        } else {
            state
                .get(STATE_LAST_OUTPUT)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| task.input.clone())
        };

        let next_service = &self.services[idx];
        let sub_task = TaskDefinition::new(task.task_id, input);
        let message = QueueMessage::with_payload(TOPIC_CONTROL_PLANE, next_service, Action::NewTask, &sub_task)
            .map_err(|e| OrchestratorError::MalformedState(e.to_string()))?;

        let mut delta = StateDelta::new();
        delta.insert(STATE_NEXT_INDEX.to_string(), json!(idx + 1));
        Ok((vec![message], delta))
    }

    fn add_result_to_state(&self, result: &TaskResult, _state: &HashMap<String, Value>) -> StateDelta {
        let mut delta = StateDelta::new();
        delta.insert(STATE_LAST_OUTPUT.to_string(), json!(result.result));
        delta
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::util::TaskId;

    fn task(input: &str) -> TaskDefinition {
        TaskDefinition::new(TaskId::new(), input)
    }

    #[tokio::test]
    async fn first_call_dispatches_to_index_zero_with_task_input() {
        let orchestrator = PipelineOrchestrator::new(vec!["a".into(), "b".into()]);
        let task = task("ellohay orldway");
        let (messages, delta) = orchestrator.get_next_messages(&task, &[], &HashMap::new()).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].r#type, "a");
        let dispatched: TaskDefinition = messages[0].payload().unwrap();
        assert_eq!(dispatched.input, "ellohay orldway");
        assert_eq!(delta.get("next_service_index"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn completion_advances_to_next_component_with_its_output() {
        let orchestrator = PipelineOrchestrator::new(vec!["a".into(), "b".into()]);
        let task = task("ellohay orldway");
        let mut state = HashMap::new();
        state.insert("next_service_index".to_string(), json!(1));

        let result_delta =
            orchestrator.add_result_to_state(&TaskResult::ok(task.task_id, "hello world"), &state);
        state.extend(result_delta);

        let (messages, delta) = orchestrator.get_next_messages(&task, &[], &state).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].r#type, "b");
        let dispatched: TaskDefinition = messages[0].payload().unwrap();
        assert_eq!(dispatched.input, "hello world");
        assert_eq!(delta.get("next_service_index"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn past_last_component_is_terminal() {
        let orchestrator = PipelineOrchestrator::new(vec!["a".into()]);
        let task = task("input");
        let mut state = HashMap::new();
        state.insert("next_service_index".to_string(), json!(1));
        state.insert("last_output".to_string(), json!("final answer"));

        let (messages, delta) = orchestrator.get_next_messages(&task, &[], &state).await.unwrap();
        assert!(messages.is_empty());
        assert_eq!(delta.get("result"), Some(&json!("final answer")));
    }

    #[tokio::test]
    async fn empty_pipeline_fails_with_no_eligible_services() {
        let orchestrator = PipelineOrchestrator::new(vec![]);
        let err = orchestrator.get_next_messages(&task("x"), &[], &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoEligibleServices));
    }
}
