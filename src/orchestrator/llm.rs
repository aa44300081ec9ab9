//! The LLM provider boundary (§4.3 "LLM provider boundary", §1 out-of-scope).
//!
//! Real providers are a deliberately out-of-scope external collaborator
//! (§1); the agent orchestrator and agent service depend only on
//! [`LlmClient`]. [`ScriptedLlmClient`] is the one concrete implementation
//! this crate ships, replaying a fixed response sequence for tests and demos.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::ChatMessage;

#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("scripted llm client exhausted its response sequence")]
    ScriptExhausted,
    #[error("llm provider error: {0}")]
    Provider(String),
}

/// A chat-completion provider. One `complete` call per orchestrator decision
/// point or agent step.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatMessage, LlmError>;
}

/// Deterministic test/demo [`LlmClient`] that replays a fixed sequence of
/// responses, ignoring its input. Cycling back to the start once exhausted
/// keeps long-running demos from hitting [`LlmError::ScriptExhausted`].
pub struct ScriptedLlmClient {
    responses: Vec<ChatMessage>,
    cursor: AtomicUsize,
    cyclic: bool,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<ChatMessage>) -> Self {
        Self {
            responses,
            cursor: AtomicUsize::new(0),
            cyclic: false,
        }
    }

    /// Once the script is exhausted, start again from the first response
    /// instead of erroring.
    pub fn cyclic(mut self) -> Self {
        self.cyclic = true;
        self
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<ChatMessage, LlmError> {
        if self.responses.is_empty() {
            return Err(LlmError::ScriptExhausted);
        }
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.cyclic {
            Ok(self.responses[idx % self.responses.len()].clone())
        } else if idx < self.responses.len() {
            Ok(self.responses[idx].clone())
        } else {
            Err(LlmError::ScriptExhausted)
        }
    }
}
