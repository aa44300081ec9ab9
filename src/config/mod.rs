//! Layered runtime configuration (§9.1).
//!
//! Defaults, then an optional TOML file, then `AGENTMESH_*` environment
//! variables — the same `config`-crate-backed layering and
//! `Default` + `validate()` + fluent builder shape used throughout this
//! codebase for configuration structs.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes when loading or validating a [`RuntimeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime knobs for the orchestrator, retrieval, broker, and HTTP binds.
///
/// Every field here has a conservative default suitable for `cargo test`
/// and the `local` launcher; production deployments override via a TOML
/// file and/or `AGENTMESH_*` environment variables (e.g.
/// `AGENTMESH_MAX_CALLS=20`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cadence at which every service's `processing_loop` steps outstanding work.
    #[serde(with = "crate::util::serde_helpers::duration_serde")]
    pub step_interval: Duration,
    /// Agent orchestrator dispatch-depth cap (§4.3 termination guard).
    pub max_calls: u32,
    /// At or below this many registered services, the control plane presents
    /// all of them to the orchestrator instead of using the retrieval index (§4.4).
    pub services_retrieval_threshold: usize,
    /// How many services the retrieval index returns above the threshold.
    pub top_k: usize,
    /// Broker delivery attempts before dead-lettering (§4.1).
    pub broker_retry_limit: u32,
    /// Broker exponential-backoff base delay.
    #[serde(with = "crate::util::serde_helpers::duration_serde")]
    pub broker_base_delay: Duration,
    /// Broker exponential-backoff cap.
    #[serde(with = "crate::util::serde_helpers::duration_serde")]
    pub broker_max_delay: Duration,
    /// Control plane HTTP bind host (`server` launcher mode).
    pub control_plane_host: String,
    /// Control plane HTTP bind port.
    pub control_plane_port: u16,
    /// `MetaServiceTool` wall-clock timeout for a tool-call round trip.
    #[serde(with = "crate::util::serde_helpers::duration_serde")]
    pub tool_call_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            step_interval: Duration::from_millis(100),
            max_calls: 10,
            services_retrieval_threshold: 5,
            top_k: 5,
            broker_retry_limit: 3,
            broker_base_delay: Duration::from_millis(50),
            broker_max_delay: Duration::from_secs(5),
            control_plane_host: "127.0.0.1".to_string(),
            control_plane_port: 8001,
            tool_call_timeout: Duration::from_secs(30),
        }
    }
}

impl RuntimeConfig {
    /// Load layered configuration: built-in defaults, then `path` (if it
    /// exists), then `AGENTMESH_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(config::Environment::with_prefix("AGENTMESH").separator("__"));
        // `RuntimeConfig` is `#[serde(default)]`, so any field absent from both
        // the file and the environment falls back to `Default::default()`.
        let loaded: RuntimeConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations that would make the system un-runnable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_calls == 0 {
            return Err(ConfigError::Invalid("max_calls must be at least 1".into()));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }
        if self.broker_retry_limit == 0 {
            return Err(ConfigError::Invalid("broker_retry_limit must be at least 1".into()));
        }
        if self.broker_base_delay > self.broker_max_delay {
            return Err(ConfigError::Invalid("broker_base_delay cannot exceed broker_max_delay".into()));
        }
        Ok(())
    }

    pub fn with_max_calls(mut self, max_calls: u32) -> Self {
        self.max_calls = max_calls;
        self
    }

    pub fn with_services_retrieval_threshold(mut self, threshold: usize) -> Self {
        self.services_retrieval_threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_control_plane_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.control_plane_host = host.into();
        self.control_plane_port = port;
        self
    }
}
