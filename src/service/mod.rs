//! The service contract shared by every worker kind, and its four variants
//! (§4.2): [`AgentService`], [`ToolService`], [`HumanService`], and
//! [`ComponentService`].

mod agent;
mod component;
mod contract;
mod error;
mod human;
pub mod http;
mod tool;

pub use agent::AgentService;
pub use component::{Component, ComponentService};
pub use contract::{as_consumer, launch_local, register_to_control_plane, register_to_message_queue, spawn_processing_loop, Service, ServiceControl};
pub use error::ServiceError;
pub use human::{HumanInput, HumanService, ScriptedHumanInput};
pub use tool::{MetaServiceTool, Tool, ToolCallResultTable, ToolOutput, ToolService};
