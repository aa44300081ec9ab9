//! Cross-module end-to-end scenarios, wired through the real broker
//! scheduler loop and control plane rather than calling component methods
//! directly.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;

use agentmesh_rt::broker::{BrokerConfig, Consumer, HandlerFn, InMemoryBroker, MessageBroker};
use agentmesh_rt::control_plane::{BagOfWordsIndex, ControlPlane, ServiceRegistry, TaskStore};
use agentmesh_rt::kv::InMemoryKvStore;
use agentmesh_rt::message::{Action, ChatMessage, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, TOPIC_HUMAN};
use agentmesh_rt::orchestrator::{AgentOrchestrator, Orchestrator, OrchestratorError, PipelineOrchestrator, ScriptedLlmClient, StateDelta};
use agentmesh_rt::service::{self, AgentService, Component, ComponentService, HumanService, ScriptedHumanInput, Service, Tool, ToolOutput};
use agentmesh_rt::util::TaskId;

/// Runs the broker's scheduler loop in the background and returns a stop
/// handle; every scenario needs this, since dispatch only happens through
/// the broker, never by direct method calls between components (§9).
struct RunningBroker {
    broker: InMemoryBroker,
    handle: tokio::task::JoinHandle<()>,
}

impl RunningBroker {
    fn start(broker: InMemoryBroker) -> Self {
        let run_handle = broker.clone();
        let handle = tokio::spawn(async move { run_handle.run().await });
        Self { broker, handle }
    }

    async fn stop(self) {
        self.broker.stop();
        self.handle.await.unwrap();
    }
}

/// Subscribes to `"human"` and hands back every [`TaskResult`] published
/// there, so scenarios can wait for a terminal result without polling the
/// task store directly.
async fn capture_human_results(broker: &dyn MessageBroker) -> Arc<AsyncMutex<Vec<TaskResult>>> {
    let captured: Arc<AsyncMutex<Vec<TaskResult>>> = Arc::new(AsyncMutex::new(Vec::new()));
    let captured_clone = captured.clone();
    let handler = Arc::new(HandlerFn(move |m: QueueMessage| {
        let captured = captured_clone.clone();
        async move {
            captured.lock().await.push(m.payload().unwrap());
            Ok(())
        }
    }));
    broker
        .register_consumer(Consumer::local(agentmesh_rt::util::ConsumerId::new(), TOPIC_HUMAN, handler))
        .await
        .unwrap();
    captured
}

async fn wait_for_result(captured: &Arc<AsyncMutex<Vec<TaskResult>>>) -> TaskResult {
    for _ in 0..200 {
        if let Some(result) = captured.lock().await.first().cloned() {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no terminal result published to \"human\" within the test deadline");
}

// Scenario 1: single agent, single tool.

struct SecretFactTool;

#[async_trait]
impl Tool for SecretFactTool {
    fn name(&self) -> &str {
        "secret_fact"
    }
    fn description(&self) -> &str {
        "returns the secret fact"
    }
    async fn call(&self, _arguments: &HashMap<String, Value>) -> ToolOutput {
        ToolOutput::ok("A baby llama is called a 'Cria'.")
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
async fn single_agent_single_tool_reaches_a_terminal_result_containing_the_secret_fact() {
    let in_memory = InMemoryBroker::default();
    let broker: Arc<dyn MessageBroker> = Arc::new(in_memory.clone());

    let registry = ServiceRegistry::new(Arc::new(InMemoryKvStore::new()), Arc::new(BagOfWordsIndex::new()), 5, 5);
    let tasks = TaskStore::new(Arc::new(InMemoryKvStore::new()));
    let orchestrator = Arc::new(PipelineOrchestrator::new(vec!["secret_fact_agent".to_string()]));
    let control_plane = Arc::new(ControlPlane::new(registry, tasks, orchestrator, broker.clone()));
    agentmesh_rt::control_plane::register_to_message_queue(control_plane.clone(), broker.as_ref()).await.unwrap();

    let llm = Arc::new(ScriptedLlmClient::new(vec![tool_call_reply(), final_reply("A baby llama is called a 'Cria'.")]));
    let agent = Arc::new(
        AgentService::new(
            "secret_fact_agent",
            "knows the secret fact",
            "answer using your tool",
            llm,
            broker.clone(),
        )
        .with_tool(Arc::new(SecretFactTool)),
    );
    service::register_to_message_queue(agent.clone(), broker.as_ref()).await.unwrap();
    control_plane.register_service(agent.service_definition()).await.unwrap();
    let (agent_handle, agent_shutdown) = service::spawn_processing_loop(agent);

    let human_results = capture_human_results(broker.as_ref()).await;
    let running = RunningBroker::start(in_memory);

    let task = TaskDefinition::new(TaskId::new(), "What is the secret fact?");
    control_plane.submit_task(task).await.unwrap();

    let result = wait_for_result(&human_results).await;
    assert!(!result.is_error);
    assert!(result.result.contains("Cria"), "unexpected result: {}", result.result);

    let _ = agent_shutdown.send(());
    agent_handle.await.unwrap();
    running.stop().await;
}

// Scenario 2: two-component pipeline undoing pig latin.

/// First half of the demo transform: strips a trailing "ay" from each token
/// (the naive pig-latin suffix), leaving the last original character on the
/// end of the stem for the next component to reposition.
struct RemoveAy;

#[async_trait]
impl Component for RemoveAy {
    async fn run_step(&self, input: &str, state: &HashMap<String, Value>) -> (String, HashMap<String, Value>, bool) {
        let output = input
            .split_whitespace()
            .map(|word| word.strip_suffix("ay").unwrap_or(word).to_string())
            .collect::<Vec<_>>()
            .join(" ");
        (output, state.clone(), true)
    }
}

/// Second half: moves each token's last character to the front, undoing the
/// consonant shift the original pig-latin encoding performed.
struct CorrectFirstCharacter;

#[async_trait]
impl Component for CorrectFirstCharacter {
    async fn run_step(&self, input: &str, state: &HashMap<String, Value>) -> (String, HashMap<String, Value>, bool) {
        let output = input
            .split_whitespace()
            .map(|word| {
                let mut chars: Vec<char> = word.chars().collect();
                match chars.pop() {
                    Some(last) => {
                        let mut restored = String::with_capacity(word.len());
                        restored.push(last);
                        restored.extend(chars);
                        restored
                    }
                    None => word.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        (output, state.clone(), true)
    }
}

#[tokio::test]
async fn pipeline_of_two_agents_chains_output_to_input_and_terminates() {
    let in_memory = InMemoryBroker::default();
    let broker: Arc<dyn MessageBroker> = Arc::new(in_memory.clone());

    let registry = ServiceRegistry::new(Arc::new(InMemoryKvStore::new()), Arc::new(BagOfWordsIndex::new()), 5, 5);
    let tasks = TaskStore::new(Arc::new(InMemoryKvStore::new()));
    let orchestrator = Arc::new(PipelineOrchestrator::new(vec![
        "remove_ay_agent".to_string(),
        "correct_first_character_agent".to_string(),
    ]));
    let control_plane = Arc::new(ControlPlane::new(registry, tasks, orchestrator, broker.clone()));
    agentmesh_rt::control_plane::register_to_message_queue(control_plane.clone(), broker.as_ref()).await.unwrap();

    let remove_ay = Arc::new(ComponentService::new(
        "remove_ay_agent",
        "removes the 'ay' suffix from each token",
        Arc::new(RemoveAy),
        broker.clone(),
    ));
    service::register_to_message_queue(remove_ay.clone(), broker.as_ref()).await.unwrap();
    control_plane.register_service(remove_ay.service_definition()).await.unwrap();
    let (remove_ay_handle, remove_ay_shutdown) = service::spawn_processing_loop(remove_ay);

    let correct_first = Arc::new(ComponentService::new(
        "correct_first_character_agent",
        "moves the last character of each token to the front",
        Arc::new(CorrectFirstCharacter),
        broker.clone(),
    ));
    service::register_to_message_queue(correct_first.clone(), broker.as_ref()).await.unwrap();
    control_plane.register_service(correct_first.service_definition()).await.unwrap();
    let (correct_first_handle, correct_first_shutdown) = service::spawn_processing_loop(correct_first);

    let human_results = capture_human_results(broker.as_ref()).await;
    let running = RunningBroker::start(in_memory);

    let task = TaskDefinition::new(TaskId::new(), "ellohay orldway");
    control_plane.submit_task(task).await.unwrap();

    let result = wait_for_result(&human_results).await;
    assert_eq!(result.result, "hello world");

    let _ = remove_ay_shutdown.send(());
    remove_ay_handle.await.unwrap();
    let _ = correct_first_shutdown.send(());
    correct_first_handle.await.unwrap();
    running.stop().await;
}

// Scenario 3: human-in-the-loop via the agent orchestrator.

fn dispatch_reply(service: &str, input: &str) -> ChatMessage {
    ChatMessage::assistant(input)
        .with_kwarg("decision", json!("dispatch"))
        .with_kwarg("service", json!(service))
}

#[tokio::test]
async fn human_in_the_loop_answer_becomes_the_terminal_result() {
    let in_memory = InMemoryBroker::default();
    let broker: Arc<dyn MessageBroker> = Arc::new(in_memory.clone());

    let registry = ServiceRegistry::new(Arc::new(InMemoryKvStore::new()), Arc::new(BagOfWordsIndex::new()), 5, 5);
    let tasks = TaskStore::new(Arc::new(InMemoryKvStore::new()));
    let llm = Arc::new(ScriptedLlmClient::new(vec![
        dispatch_reply("human_service", "What is 5 + 5?"),
        final_reply("10"),
    ]));
    let orchestrator = Arc::new(AgentOrchestrator::new(llm, 10));
    let control_plane = Arc::new(ControlPlane::new(registry, tasks, orchestrator, broker.clone()));
    agentmesh_rt::control_plane::register_to_message_queue(control_plane.clone(), broker.as_ref()).await.unwrap();

    let human = Arc::new(
        HumanService::new("human_service", "asks a human for help", broker.clone())
            .with_input(Arc::new(ScriptedHumanInput::new(vec!["10".to_string()]))),
    );
    service::register_to_message_queue(human.clone(), broker.as_ref()).await.unwrap();
    control_plane.register_service(human.service_definition()).await.unwrap();
    let (human_handle, human_shutdown) = service::spawn_processing_loop(human);

    let human_results = capture_human_results(broker.as_ref()).await;
    let running = RunningBroker::start(in_memory);

    let task = TaskDefinition::new(TaskId::new(), "What is 5 + 5?");
    control_plane.submit_task(task).await.unwrap();

    let result = wait_for_result(&human_results).await;
    assert_eq!(result.result, "10");

    let _ = human_shutdown.send(());
    human_handle.await.unwrap();
    running.stop().await;
}

// Scenario 4: retrieval routing picks the best-matching service out of many
// The orchestrator below is a minimal stand-in that
// always dispatches to the first candidate it is handed, so the test
// isolates the registry/index's retrieval behavior rather than an LLM's
// choice among already-retrieved candidates.
struct DispatchFirstCandidate;

#[async_trait]
impl Orchestrator for DispatchFirstCandidate {
    async fn get_next_messages(
        &self,
        task: &TaskDefinition,
        candidates: &[ServiceDefinition],
        state: &HashMap<String, Value>,
    ) -> Result<(Vec<QueueMessage>, StateDelta), OrchestratorError> {
        if state.contains_key("dispatched") {
            let mut delta = StateDelta::new();
            delta.insert("result".to_string(), json!("done"));
            return Ok((Vec::new(), delta));
        }
        let Some(first) = candidates.first() else {
            return Err(OrchestratorError::NoEligibleServices);
        };
        let sub_task = TaskDefinition::new(task.task_id, task.input.clone());
        let message = QueueMessage::with_payload("control_plane", &first.service_name, Action::NewTask, &sub_task).unwrap();
        let mut delta = StateDelta::new();
        delta.insert("dispatched".to_string(), json!(true));
        Ok((vec![message], delta))
    }

    fn add_result_to_state(&self, _result: &TaskResult, _state: &HashMap<String, Value>) -> StateDelta {
        StateDelta::new()
    }
}

#[tokio::test]
async fn retrieval_above_threshold_routes_to_the_best_matching_service() {
    let in_memory = InMemoryBroker::default();
    let broker: Arc<dyn MessageBroker> = Arc::new(in_memory.clone());

    // Ten services, one per topic, distinct descriptions; only #7 mentions
    // weather, so it should be retrieved first for a weather-flavored query.
    let descriptions = [
        "tells jokes and puns",
        "reports breaking news headlines",
        "writes short poems",
        "translates text between languages",
        "summarizes long documents",
        "schedules calendar appointments",
        "reports weather forecasts for any city",
        "recommends recipes for dinner",
        "answers trivia questions",
        "converts units of measurement",
    ];

    let registry = ServiceRegistry::new(Arc::new(InMemoryKvStore::new()), Arc::new(BagOfWordsIndex::new()), 3, 3);
    for (i, description) in descriptions.iter().enumerate() {
        registry.register(ServiceDefinition::new(format!("service_{i}"), *description)).await.unwrap();
    }

    let tasks = TaskStore::new(Arc::new(InMemoryKvStore::new()));
    let orchestrator = Arc::new(DispatchFirstCandidate);
    let control_plane = Arc::new(ControlPlane::new(registry, tasks, orchestrator, broker.clone()));
    agentmesh_rt::control_plane::register_to_message_queue(control_plane.clone(), broker.as_ref()).await.unwrap();

    let captured: Arc<AsyncMutex<Vec<QueueMessage>>> = Arc::new(AsyncMutex::new(Vec::new()));
    let captured_clone = captured.clone();
    let handler = Arc::new(HandlerFn(move |m: QueueMessage| {
        let captured = captured_clone.clone();
        async move {
            captured.lock().await.push(m);
            Ok(())
        }
    }));
    broker
        .register_consumer(Consumer::local(agentmesh_rt::util::ConsumerId::new(), "service_6", handler))
        .await
        .unwrap();

    let running = RunningBroker::start(in_memory);

    let task = TaskDefinition::new(TaskId::new(), "what's the weather forecast like today?");
    control_plane.submit_task(task).await.unwrap();

    let first_dispatch = {
        let mut waited = Duration::ZERO;
        loop {
            if let Some(m) = captured.lock().await.first().cloned() {
                break m;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
            assert!(waited < Duration::from_secs(2), "no NEW_TASK reached service_6 in time");
        }
    };
    assert_eq!(first_dispatch.r#type, "service_6");

    running.stop().await;
}

// Scenario 6: a remote consumer that always fails is dead-lettered after the
// retry limit. No control plane is needed here; this
// exercises the broker directly through its HTTP-delivery path.
#[tokio::test]
async fn broker_dead_letters_after_exhausting_delivery_retries() {
    let mock_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let broker = InMemoryBroker::new(BrokerConfig {
        retry_limit: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        idle_sleep: Duration::from_millis(1),
    });

    broker
        .register_consumer(Consumer::remote(
            agentmesh_rt::util::ConsumerId::new(),
            "flaky_topic",
            mock_server.uri(),
        ))
        .await
        .unwrap();

    let dlq_messages: Arc<AsyncMutex<Vec<QueueMessage>>> = Arc::new(AsyncMutex::new(Vec::new()));
    let dlq_clone = dlq_messages.clone();
    let dlq_handler = Arc::new(HandlerFn(move |m: QueueMessage| {
        let dlq_messages = dlq_clone.clone();
        async move {
            dlq_messages.lock().await.push(m);
            Ok(())
        }
    }));
    broker
        .register_consumer(Consumer::local(agentmesh_rt::util::ConsumerId::new(), "flaky_topic.dlq", dlq_handler))
        .await
        .unwrap();

    broker
        .publish(QueueMessage::new("client", "flaky_topic", Action::NewTask, json!({})))
        .await
        .unwrap();

    let running = RunningBroker::start(broker);
    tokio::time::sleep(Duration::from_millis(200)).await;
    running.stop().await;

    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    assert_eq!(dlq_messages.lock().await.len(), 1);
}
