//! The control plane (§4.4): service registry, task store, retrieval index,
//! and the dispatch algorithm that ties them to an [`Orchestrator`](crate::orchestrator::Orchestrator).

mod dispatch;
mod error;
mod index;
pub mod http;
mod registry;
mod task_store;

pub use dispatch::{as_consumer, register_to_message_queue, ControlPlane};
pub use error::ControlPlaneError;
pub use index::{BagOfWordsIndex, ServiceIndex};
pub use registry::ServiceRegistry;
pub use task_store::{PersistedTask, TaskStatus, TaskStore};
