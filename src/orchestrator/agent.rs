//! The LLM-driven agent orchestrator (§4.3).

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::error::OrchestratorError;
use super::llm::LlmClient;
use super::traits::{Orchestrator, StateDelta};
use crate::message::{Action, ChatMessage, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, TOPIC_CONTROL_PLANE};
use crate::util::TaskId;

const STATE_HISTORY: &str = "history";
const STATE_NUM_CALLS: &str = "num_calls";
const STATE_LAST_DISPATCH: &str = "last_dispatch";
const STATE_PENDING_SUB_TASKS: &str = "pending_sub_tasks";
const STATE_RESULT: &str = "result";

enum Decision {
    Final(String),
    Dispatch { service: String, input: String },
}

fn parse_decision(msg: &ChatMessage) -> Result<Decision, OrchestratorError> {
    match msg.additional_kwargs.get("decision").and_then(Value::as_str) {
        Some("final") => Ok(Decision::Final(msg.content.clone())),
        Some("dispatch") => {
            let service = msg
                .additional_kwargs
                .get("service")
                .and_then(Value::as_str)
                .ok_or_else(|| OrchestratorError::LlmFailure("dispatch decision missing 'service'".into()))?
                .to_string();
            Ok(Decision::Dispatch {
                service,
                input: msg.content.clone(),
            })
        }
        other => Err(OrchestratorError::LlmFailure(format!(
            "expected decision kwarg of 'final' or 'dispatch', got {other:?}"
        ))),
    }
}

fn read_history(state: &HashMap<String, Value>) -> Vec<ChatMessage> {
    state
        .get(STATE_HISTORY)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Decides the next step by asking an [`LlmClient`] to pick exactly one
/// candidate service (and its sub-input) or produce a final answer (§4.3).
///
/// State carries `history` (chat turns), `num_calls`, `last_dispatch`
/// (loop-break detection), and `pending_sub_tasks` (sub-task-id →
/// parent-task-id correlation, so a completed sub-task's result can find
/// its way back to the task that spawned it).
pub struct AgentOrchestrator {
    llm: Arc<dyn LlmClient>,
    max_calls: u32,
}

impl AgentOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, max_calls: u32) -> Self {
        Self { llm, max_calls }
    }

    fn build_prompt(task: &TaskDefinition, candidates: &[ServiceDefinition], history: &[ChatMessage]) -> Vec<ChatMessage> {
        let roster = candidates
            .iter()
            .map(|c| format!("- {}: {}", c.service_name, c.description))
            .collect::<Vec<_>>()
            .join("\n");
        let system = ChatMessage::system(format!(
            "You are routing a task to one of these services, or answering directly if you can:\n{roster}\n\nTask: {}",
            task.input
        ));
        let mut messages = vec![system];
        messages.extend(history.iter().cloned());
        messages
    }
}

#[async_trait]
impl Orchestrator for AgentOrchestrator {
    async fn get_next_messages(
        &self,
        task: &TaskDefinition,
        candidates: &[ServiceDefinition],
        state: &HashMap<String, Value>,
    ) -> Result<(Vec<QueueMessage>, StateDelta), OrchestratorError> {
        let num_calls = state.get(STATE_NUM_CALLS).and_then(Value::as_u64).unwrap_or(0);
        if num_calls >= self.max_calls as u64 {
            warn!(task_id = %task.task_id, num_calls, "agent orchestrator hit max_calls");
            let mut delta = StateDelta::new();
            delta.insert(
                STATE_RESULT.to_string(),
                json!(format!("stopped after reaching the call limit ({})", self.max_calls)),
            );
            return Ok((Vec::new(), delta));
        }

        if candidates.is_empty() {
            return Err(OrchestratorError::NoEligibleServices);
        }

        let history = read_history(state);
        let prompt = Self::build_prompt(task, candidates, &history);
        let reply = self.llm.complete(&prompt).await.map_err(|e| OrchestratorError::LlmFailure(e.to_string()))?;
        let decision = parse_decision(&reply)?;

        let mut next_history = history;
        next_history.push(reply);

        match decision {
            Decision::Final(answer) => {
                debug!(task_id = %task.task_id, "agent orchestrator reached final answer");
                let mut delta = StateDelta::new();
                delta.insert(STATE_RESULT.to_string(), json!(answer));
                delta.insert(STATE_HISTORY.to_string(), json!(next_history));
                Ok((Vec::new(), delta))
            }
            Decision::Dispatch { service, input } => {
                if !candidates.iter().any(|c| c.service_name == service) {
                    return Err(OrchestratorError::LlmFailure(format!(
                        "llm chose unknown service '{service}'"
                    )));
                }

                let attempted = json!({"service": service, "input": input});
                if state.get(STATE_LAST_DISPATCH) == Some(&attempted) {
                    warn!(task_id = %task.task_id, service, "loop-break: identical dispatch repeated");
                    let mut delta = StateDelta::new();
                    delta.insert(
                        STATE_RESULT.to_string(),
                        json!(format!("stopped: '{service}' was dispatched twice in a row with the same input")),
                    );
                    delta.insert(STATE_HISTORY.to_string(), json!(next_history));
                    return Ok((Vec::new(), delta));
                }

                let sub_task_id = TaskId::new();
                let sub_task = TaskDefinition::new(sub_task_id, input);
                let message = QueueMessage::with_payload(TOPIC_CONTROL_PLANE, &service, Action::NewTask, &sub_task)
                    .map_err(|e| OrchestratorError::MalformedState(e.to_string()))?;

                let mut pending: Map<String, Value> = state
                    .get(STATE_PENDING_SUB_TASKS)
                    .and_then(|v| v.as_object().cloned())
                    .unwrap_or_default();
                pending.insert(sub_task_id.to_string(), json!(task.task_id.to_string()));

                let mut delta = StateDelta::new();
                delta.insert(STATE_NUM_CALLS.to_string(), json!(num_calls + 1));
                delta.insert(STATE_LAST_DISPATCH.to_string(), attempted);
                delta.insert(STATE_PENDING_SUB_TASKS.to_string(), Value::Object(pending));
                delta.insert(STATE_HISTORY.to_string(), json!(next_history));
                Ok((vec![message], delta))
            }
        }
    }

    fn add_result_to_state(&self, result: &TaskResult, state: &HashMap<String, Value>) -> StateDelta {
        let mut history = read_history(state);
        history.push(ChatMessage::tool(result.result.clone()));

        let mut pending: Map<String, Value> = state
            .get(STATE_PENDING_SUB_TASKS)
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        pending.remove(&result.task_id.to_string());

        let mut delta = StateDelta::new();
        delta.insert(STATE_HISTORY.to_string(), json!(history));
        delta.insert(STATE_PENDING_SUB_TASKS.to_string(), Value::Object(pending));
        delta
    }
}
