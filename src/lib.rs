//! # agentmesh-rt — distributed multi-agent task execution runtime
//!
//! A client submits a natural-language task; the control plane dispatches it
//! to cooperating **services** (LLM-backed agents, tool executors, humans)
//! that communicate strictly through a **message broker**, with an
//! **orchestrator** deciding at each step which service acts next.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use agentmesh_rt::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let broker = InMemoryBroker::default();
//!     let kv = InMemoryKvStore::default();
//!     let orchestrator = PipelineOrchestrator::new(vec!["remove_ay_agent".into()]);
//!     let control_plane = ControlPlane::new(broker.clone(), kv, Box::new(orchestrator), RuntimeConfig::default());
//!     // register services, then:
//!     control_plane.submit_task(TaskDefinition::new(TaskId::new(), "ellohay orldway")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`message`] — wire types: `QueueMessage`, `Action`, task/tool/chat payloads, `ServiceDefinition`.
//! - [`broker`] — the broker contract and its in-process + HTTP-exposed implementations.
//! - [`kv`] — the pluggable key-value store abstraction backing task/service persistence.
//! - [`orchestrator`] — the dispatch-decision contract, pipeline and agent-driven orchestrators.
//! - [`service`] — the service contract and its agent/tool/human/component variants.
//! - [`control_plane`] — service registry, task store, retrieval, and the dispatch loop.
//! - [`config`] — layered `RuntimeConfig`.
//! - [`cli`] — the launcher's `clap`-derived command surface.
//! - [`util`] — shared identifier newtypes and serde helpers.
//!
//! # Design Principles (§9)
//!
//! - Components never call one another directly; everything is reached
//!   through the broker by topic name (no cyclic ownership between broker,
//!   service, and control plane).
//! - Routing dispatches on the `Action` enum, not on dynamic type checks.
//! - The launcher owns every singleton and injects handles into the rest of
//!   the system (no global mutable state).

pub mod broker;
pub mod cli;
pub mod config;
pub mod control_plane;
pub mod kv;
pub mod message;
pub mod orchestrator;
pub mod service;
pub mod util;

/// Commonly used types, re-exported for `use agentmesh_rt::prelude::*;`.
pub mod prelude {
    pub use crate::broker::{
        BrokerConfig, BrokerError, Consumer, ConsumerHandler, HandlerFn, InMemoryBroker, MessageBroker,
    };
    pub use crate::config::RuntimeConfig;
    pub use crate::control_plane::{ControlPlane, ControlPlaneError};
    pub use crate::kv::{InMemoryKvStore, KvStore};
    pub use crate::message::{
        Action, ChatMessage, ChatRole, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, ToolCall,
        ToolCallResult,
    };
    pub use crate::orchestrator::{AgentOrchestrator, Orchestrator, OrchestratorError, PipelineOrchestrator};
    pub use crate::service::{AgentService, ComponentService, HumanService, Service, ToolService};
    pub use crate::util::{ConsumerId, MessageId, TaskId, ToolCallId};
}
