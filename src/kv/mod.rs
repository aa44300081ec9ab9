//! Pluggable key-value persistence for the `services`/`tasks` collections (§6, §9.1).

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryKvStore;
pub use traits::{KvError, KvStore};
