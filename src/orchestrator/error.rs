//! Orchestrator error taxonomy (§4.3, §7 category 3).

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Failures the orchestrator contract can report back to the control plane.
///
/// Every variant here is a §7 "OrchestratorUndecided" case: the control
/// plane never crashes on these, it fails the task and publishes an
/// `is_error` result to `"human"`.
#[derive(Debug, Error, Clone)]
pub enum OrchestratorError {
    /// The candidate service list was empty (§4.3 edge case).
    #[error("no eligible services for task")]
    NoEligibleServices,

    /// The injected `LlmClient` failed or returned something the agent
    /// orchestrator could not parse into a decision.
    #[error("llm decision failed: {0}")]
    LlmFailure(String),

    /// State the orchestrator expected to find (e.g. `next_service_index`)
    /// was missing or of the wrong shape.
    #[error("malformed orchestrator state: {0}")]
    MalformedState(String),
}
