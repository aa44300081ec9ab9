//! `AgentService`: the LLM-driven step engine (§4.2).

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
use super::tool::{Tool, ToolCallResultTable};
use crate::broker::MessageBroker;
use crate::message::{Action, ChatMessage, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, ToolCallResult, TOPIC_CONTROL_PLANE};
use crate::orchestrator::LlmClient;
use crate::util::TaskId;

enum StepDecision {
    Final(String),
    ToolCall { tool_name: String, arguments: HashMap<String, Value> },
}

fn parse_step_decision(msg: &ChatMessage) -> Result<StepDecision, ServiceError> {
    match msg.additional_kwargs.get("decision").and_then(Value::as_str) {
        Some("final") => Ok(StepDecision::Final(msg.content.clone())),
        Some("tool_call") => {
            let tool_name = msg
                .additional_kwargs
                .get("tool_name")
                .and_then(Value::as_str)
                .ok_or_else(|| ServiceError::Decision("tool_call decision missing 'tool_name'".into()))?
                .to_string();
            let arguments = msg
                .additional_kwargs
                .get("arguments")
                .and_then(Value::as_object)
                .map(|obj| obj.clone().into_iter().collect())
                .unwrap_or_default();
            Ok(StepDecision::ToolCall { tool_name, arguments })
        }
        other => Err(ServiceError::Decision(format!(
            "expected decision of 'final' or 'tool_call', got {other:?}"
        ))),
    }
}

struct AgentRun {
    history: Vec<ChatMessage>,
    done: bool,
}

/// Holds an LLM-driven ReAct-style step engine: each [`step`](Service::step)
/// call advances one outstanding task by exactly one LLM turn, invoking a
/// tool if asked, and publishing `COMPLETED_TASK` once the LLM answers
/// directly rather than calling a tool (§4.2).
pub struct AgentService {
    service_name: String,
    description: String,
    prompt: String,
    llm: Arc<dyn LlmClient>,
    tools: Vec<Arc<dyn Tool>>,
    broker: Arc<dyn MessageBroker>,
    tool_results: Arc<ToolCallResultTable>,
    runs: DashMap<TaskId, AgentRun>,
    control: ServiceControl,
}

impl AgentService {
    pub fn new(
        service_name: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            description: description.into(),
            prompt: prompt.into(),
            llm,
            tools: Vec::new(),
            broker,
            tool_results: Arc::new(ToolCallResultTable::new()),
            runs: DashMap::new(),
            control: ServiceControl::default(),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Shared with any [`super::tool::MetaServiceTool`] this service
    /// constructs, so `process_message`'s `COMPLETED_TOOL_CALL` handling
    /// can wake it.
    pub fn tool_results(&self) -> Arc<ToolCallResultTable> {
        self.tool_results.clone()
    }

    fn opening_history(&self, task: &TaskDefinition) -> Vec<ChatMessage> {
        let roster = self
            .tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let system = if roster.is_empty() {
            ChatMessage::system(self.prompt.clone())
        } else {
            ChatMessage::system(format!("{}\n\nAvailable tools:\n{roster}", self.prompt))
        };
        vec![system, ChatMessage::user(task.input.clone())]
    }

    async fn run_one_step(&self, task_id: TaskId) -> Result<(), ServiceError> {
        let history = match self.runs.get(&task_id) {
            Some(run) if !run.done => run.history.clone(),
            _ => return Ok(()),
        };

        let reply = self.llm.complete(&history).await.map_err(|e| ServiceError::Http(e.to_string()))?;
        let decision = parse_step_decision(&reply)?;

        if let Some(mut run) = self.runs.get_mut(&task_id) {
            run.history.push(reply);
        }

        match decision {
            StepDecision::Final(answer) => {
                let final_history = self.runs.get(&task_id).map(|r| r.history.clone()).unwrap_or_default();
                info!(task_id = %task_id, service = %self.service_name, "agent task complete");
                let result = TaskResult::ok(task_id, answer).with_history(final_history);
                let message = QueueMessage::with_payload(self.service_name.clone(), TOPIC_CONTROL_PLANE, Action::CompletedTask, &result)?;
                self.broker.publish(message).await?;
                self.runs.remove(&task_id);
                Ok(())
            }
            StepDecision::ToolCall { tool_name, arguments } => {
                let tool = self.tools.iter().find(|t| t.name() == tool_name).cloned();
                let output = match tool {
                    Some(tool) => tool.call(&arguments).await,
                    None => super::tool::ToolOutput::error(format!("unknown tool: {tool_name}")),
                };
                if let Some(mut run) = self.runs.get_mut(&task_id) {
                    let content = if output.is_error {
                        format!("error: {}", output.content)
                    } else {
                        output.content
                    };
                    run.history.push(ChatMessage::tool(content));
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Service for AgentService {
    fn service_definition(&self) -> ServiceDefinition {
        ServiceDefinition::new(self.service_name.clone(), self.description.clone()).with_prompt(self.prompt.clone())
    }

    fn control(&self) -> &ServiceControl {
        &self.control
    }

    async fn process_message(&self, message: QueueMessage) -> Result<(), ServiceError> {
        match message.action {
            Action::NewTask => {
                let task: TaskDefinition = message.payload()?;
                debug!(task_id = %task.task_id, service = %self.service_name, "agent task queued");
                let history = self.opening_history(&task);
                self.runs.insert(task.task_id, AgentRun { history, done: false });
                Ok(())
            }
            Action::CompletedToolCall => {
                let result: ToolCallResult = message.payload()?;
                self.tool_results.fulfill(result);
                Ok(())
            }
            other => {
                warn!(service = %self.service_name, action = %other, "agent service ignoring unsupported action");
                Ok(())
            }
        }
    }

    async fn step(&self) -> Result<(), ServiceError> {
        let next = self.runs.iter().find(|e| !e.value().done).map(|e| *e.key());
        let Some(task_id) = next else {
            return Ok(());
        };
        self.run_one_step(task_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::broker::{Consumer, HandlerFn, InMemoryBroker};
    use crate::orchestrator::ScriptedLlmClient;
    use crate::util::ConsumerId;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    struct SecretFactTool;

    #[async_trait]
    impl Tool for SecretFactTool {
        fn name(&self) -> &str {
            "secret_fact"
        }
        fn description(&self) -> &str {
            "returns the secret fact"
        }
        async fn call(&self, _arguments: &HashMap<String, Value>) -> super::super::tool::ToolOutput {
            super::super::tool::ToolOutput::ok("A baby llama is called a 'Cria'.")
        }
    }

    fn tool_call_reply() -> ChatMessage {
        ChatMessage::assistant("looking it up")
            .with_kwarg("decision", json!("tool_call"))
            .with_kwarg("tool_name", json!("secret_fact"))
            .with_kwarg("arguments", json!({}))
    }

    fn final_reply(answer: &str) -> ChatMessage {
        ChatMessage::assistant(answer).with_kwarg("decision", json!("final"))
    }

    #[tokio::test]
    async fn single_tool_call_then_final_answer_completes_the_task() {
        let in_memory = InMemoryBroker::default();
        let broker: Arc<dyn MessageBroker> = Arc::new(in_memory.clone());
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            tool_call_reply(),
            final_reply("A baby llama is called a 'Cria'."),
        ]));
        let service = Arc::new(
            AgentService::new("secret_fact_agent", "knows the secret fact", "answer using your tool", llm, broker.clone())
                .with_tool(Arc::new(SecretFactTool)),
        );

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

        let task = TaskDefinition::new(TaskId::new(), "What is the secret fact?");
        let msg = QueueMessage::with_payload("client", "secret_fact_agent", Action::NewTask, &task).unwrap();
        service.process_message(msg).await.unwrap();

        // First step asks the tool for the fact; second step answers with it.
        service.step().await.unwrap();
        service.step().await.unwrap();

        let run_handle = in_memory.clone();
        let handle = tokio::spawn(async move { run_handle.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        in_memory.stop();
        handle.await.unwrap();

        let results = results.lock().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].result.contains("Cria"));
        // system, user, assistant tool-call, tool result, assistant final answer
        assert_eq!(results[0].history.len(), 5);
    }
}
