//! Service error taxonomy (§7).

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::broker::BrokerError;

/// Failures surfaced by the service contract (§4.2) and its variants.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The broker rejected a publish or consumer registration.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A `QueueMessage.data` payload did not deserialize into the shape the
    /// action implied.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// A `ToolCall` named a tool this service does not hold.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// An LLM reply could not be parsed into a step decision.
    #[error("malformed llm decision: {0}")]
    Decision(String),

    /// `MetaServiceTool.call` exceeded its wall-clock timeout with
    /// `raise_timeout` set (§5).
    #[error("tool call timed out")]
    ToolTimeout,

    /// An HTTP registration or delivery call to another process failed.
    #[error("http error: {0}")]
    Http(String),

    /// A human-service task was addressed by an id with no matching
    /// outstanding task.
    #[error("no outstanding task: {0}")]
    UnknownTask(String),
}

impl ServiceError {
    /// Whether `processing_loop` should log-and-continue rather than treat
    /// this as fatal (§7: services never exit on handler exceptions).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ServiceError::Broker(BrokerError::NotRunning))
    }
}
