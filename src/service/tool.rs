//! Tool service and the `MetaServiceTool` remote-tool proxy (§4.2).

// Layer 1: Standard library imports
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::contract::{Service, ServiceControl};
use super::error::ServiceError;
use crate::broker::MessageBroker;
use crate::message::{Action, QueueMessage, ServiceDefinition, ToolCall, ToolCallResult};
use crate::util::ToolCallId;

/// The outcome of invoking a [`Tool`]. `is_error` mirrors `ToolCallResult`
/// but a `Tool` never propagates a `Result` — failures, including a
/// `MetaServiceTool` timeout, are reported as content (§5).
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// A single named capability, held either by a [`ToolService`] (executed
/// locally on `NEW_TOOL_CALL`) or by an agent/component service directly
/// (§4.2).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, arguments: &HashMap<String, Value>) -> ToolOutput;
}

/// The condition-variable idiom behind `MetaServiceTool` (§9, replacing the
/// source system's coroutine polling): a shared table of in-flight tool
/// calls, signalled by `fulfill` and awaited by `wait_for`. Entries are
/// removed on both successful resolution and timeout (§8 "Timeout cleanup").
#[derive(Default)]
pub struct ToolCallResultTable {
    inner: Mutex<HashMap<ToolCallId, ToolCallResult>>,
    notify: Notify,
}

impl ToolCallResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a result for `result.id` has arrived, waking any waiter.
    pub fn fulfill(&self, result: ToolCallResult) {
        self.inner.lock().insert(result.id, result);
        self.notify.notify_waiters();
    }

    /// Block until a result for `id` arrives or `timeout` elapses. Always
    /// leaves no entry for `id` behind, win or lose.
    pub async fn wait_for(&self, id: ToolCallId, timeout: Duration) -> Option<ToolCallResult> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(result) = self.inner.lock().remove(&id) {
                return Some(result);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                self.inner.lock().remove(&id);
                return None;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

/// A locally invocable proxy for a tool hosted by a remote [`ToolService`]
/// (§4.2 "MetaServiceTool"). `call` publishes `NEW_TOOL_CALL` to the remote
/// service's topic and awaits the matching `ToolCallResult` on a shared
/// [`ToolCallResultTable`], bounded by a wall-clock timeout.
pub struct MetaServiceTool {
    tool_name: String,
    description: String,
    remote_service: String,
    source_id: String,
    broker: Arc<dyn MessageBroker>,
    results: Arc<ToolCallResultTable>,
    timeout: Duration,
    raise_timeout: bool,
}

impl MetaServiceTool {
    pub fn new(
        tool_name: impl Into<String>,
        description: impl Into<String>,
        remote_service: impl Into<String>,
        source_id: impl Into<String>,
        broker: Arc<dyn MessageBroker>,
        results: Arc<ToolCallResultTable>,
        timeout: Duration,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            description: description.into(),
            remote_service: remote_service.into(),
            source_id: source_id.into(),
            broker,
            results,
            timeout,
            raise_timeout: false,
        }
    }

    /// When set, a timed-out call surfaces as an error the caller must
    /// handle explicitly rather than as an `is_error` [`ToolOutput`] (§5).
    pub fn raise_on_timeout(mut self) -> Self {
        self.raise_timeout = true;
        self
    }

    /// Same as [`call`](Tool::call) but able to report the timeout as a
    /// hard error when `raise_on_timeout` was set.
    pub async fn call_checked(&self, arguments: &HashMap<String, Value>) -> Result<ToolOutput, ServiceError> {
        let mut call = ToolCall::new(self.source_id.clone(), self.tool_name.clone());
        call.arguments = arguments.clone();

        let message = QueueMessage::with_payload(self.source_id.clone(), self.remote_service.clone(), Action::NewToolCall, &call)?;
        self.broker.publish(message).await?;

        match self.results.wait_for(call.id, self.timeout).await {
            Some(result) => Ok(ToolOutput {
                content: result.content,
                is_error: result.is_error,
            }),
            None if self.raise_timeout => Err(ServiceError::ToolTimeout),
            None => Ok(ToolOutput::error(format!("tool '{}' timed out", self.tool_name))),
        }
    }
}

#[async_trait]
impl Tool for MetaServiceTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, arguments: &HashMap<String, Value>) -> ToolOutput {
        match self.call_checked(arguments).await {
            Ok(output) => output,
            Err(err) => ToolOutput::error(err.to_string()),
        }
    }
}

/// Holds a set of named [`Tool`]s and executes queued [`ToolCall`]s on
/// `NEW_TOOL_CALL`, publishing `COMPLETED_TOOL_CALL` back to the caller's
/// topic (§4.2).
pub struct ToolService {
    service_name: String,
    description: String,
    tools: HashMap<String, Arc<dyn Tool>>,
    broker: Arc<dyn MessageBroker>,
    pending: Mutex<VecDeque<ToolCall>>,
    control: ServiceControl,
}

impl ToolService {
    pub fn new(service_name: impl Into<String>, description: impl Into<String>, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            service_name: service_name.into(),
            description: description.into(),
            tools: HashMap::new(),
            broker,
            pending: Mutex::new(VecDeque::new()),
            control: ServiceControl::default(),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }
}

#[async_trait]
impl Service for ToolService {
    fn service_definition(&self) -> ServiceDefinition {
        ServiceDefinition::new(self.service_name.clone(), self.description.clone())
    }

    fn control(&self) -> &ServiceControl {
        &self.control
    }

    async fn process_message(&self, message: QueueMessage) -> Result<(), ServiceError> {
        match message.action {
            Action::NewToolCall => {
                let call: ToolCall = message.payload()?;
                debug!(tool_call_id = %call.id, tool_name = %call.tool_name, "tool call queued");
                self.pending.lock().push_back(call);
                Ok(())
            }
            other => {
                warn!(service = %self.service_name, action = %other, "tool service ignoring unsupported action");
                Ok(())
            }
        }
    }

    async fn step(&self) -> Result<(), ServiceError> {
        let call = self.pending.lock().pop_front();
        let Some(call) = call else {
            return Ok(());
        };

        let result = match self.tools.get(&call.tool_name) {
            Some(tool) => {
                let output = tool.call(&call.arguments).await;
                if output.is_error {
                    ToolCallResult::error(&call, output.content)
                } else {
                    ToolCallResult::ok(&call, output.content)
                }
            }
            None => ToolCallResult::error(&call, format!("unknown tool: {}", call.tool_name)),
        };

        let message = QueueMessage::with_payload(self.service_name.clone(), call.source_id.clone(), Action::CompletedToolCall, &result)?;
        self.broker.publish(message).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its 'text' argument"
        }
        async fn call(&self, arguments: &HashMap<String, Value>) -> ToolOutput {
            match arguments.get("text").and_then(Value::as_str) {
                Some(text) => ToolOutput::ok(text),
                None => ToolOutput::error("missing 'text' argument"),
            }
        }
    }

    #[tokio::test]
    async fn step_executes_one_pending_call_and_publishes_result() {
        let in_memory = InMemoryBroker::default();
        let broker: Arc<dyn MessageBroker> = Arc::new(in_memory.clone());
        let service = ToolService::new("echo_tool", "echoes text", broker.clone()).with_tool(Arc::new(EchoTool));

        let results: Arc<parking_lot::Mutex<Vec<ToolCallResult>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let results_clone = results.clone();
        let handler = Arc::new(crate::broker::HandlerFn(move |m: QueueMessage| {
            let results = results_clone.clone();
            async move {
                results.lock().push(m.payload().unwrap());
                Ok(())
            }
        }));
        broker
            .register_consumer(crate::broker::Consumer::local(crate::util::ConsumerId::new(), "caller_topic", handler))
            .await
            .unwrap();

        let mut call = ToolCall::new("caller_topic", "echo");
        call.arguments.insert("text".to_string(), Value::String("hi".into()));
        let msg = QueueMessage::with_payload("caller_topic", "echo_tool", Action::NewToolCall, &call).unwrap();
        service.process_message(msg).await.unwrap();
        service.step().await.unwrap();

        let run_handle = in_memory.clone();
        let handle = tokio::spawn(async move { run_handle.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        in_memory.stop();
        handle.await.unwrap();

        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "hi");
    }

    #[tokio::test]
    async fn result_table_cleans_up_on_timeout() {
        let table = ToolCallResultTable::new();
        let id = ToolCallId::new();
        let result = table.wait_for(id, Duration::from_millis(10)).await;
        assert!(result.is_none());
        assert!(table.inner.lock().is_empty());
    }

    #[tokio::test]
    async fn result_table_cleans_up_on_fulfillment() {
        let table = ToolCallResultTable::new();
        let call = ToolCall::new("caller", "tool");
        table.fulfill(ToolCallResult::ok(&call, "done"));
        let result = table.wait_for(call.id, Duration::from_millis(50)).await;
        assert!(result.is_some());
        assert!(table.inner.lock().is_empty());
    }

    #[tokio::test]
    async fn meta_service_tool_reports_is_error_output_on_timeout() {
        let broker: Arc<dyn MessageBroker> = Arc::new(InMemoryBroker::default());
        let results = Arc::new(ToolCallResultTable::new());
        let tool = MetaServiceTool::new(
            "slow_tool",
            "never replies",
            "tool_service_that_never_replies",
            "caller_agent",
            broker,
            results,
            Duration::from_millis(10),
        );

        let output = tool.call(&HashMap::new()).await;
        assert!(output.is_error);
    }

    #[tokio::test]
    async fn meta_service_tool_raises_on_timeout_when_configured() {
        let broker: Arc<dyn MessageBroker> = Arc::new(InMemoryBroker::default());
        let results = Arc::new(ToolCallResultTable::new());
        let tool = MetaServiceTool::new(
            "slow_tool",
            "never replies",
            "tool_service_that_never_replies",
            "caller_agent",
            broker,
            results,
            Duration::from_millis(10),
        )
        .raise_on_timeout();

        let err = tool.call_checked(&HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::ToolTimeout));
    }
}
