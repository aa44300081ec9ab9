//! `ServiceDefinition`: routing target and retrieval document (§3).

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

/// Describes a registered service: both "how to reach it" (topic = name,
/// host/port for HTTP delivery) and "what it's for" (description/prompt, fed
/// to the agent orchestrator and the bag-of-words retrieval index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Globally unique within a deployment; also the broker topic (§3 invariant 1).
    pub service_name: String,
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl ServiceDefinition {
    pub fn new(service_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            description: description.into(),
            prompt: String::new(),
            host: None,
            port: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// `true` when this service is reachable over HTTP rather than in-process.
    pub fn is_remote(&self) -> bool {
        self.host.is_some() && self.port.is_some()
    }

    /// Base URL for the service's HTTP surface, if remote.
    pub fn base_url(&self) -> Option<String> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some(format!("http://{host}:{port}")),
            _ => None,
        }
    }

    /// The text document this definition contributes to retrieval (§4.4):
    /// name plus description, the two fields most indicative of purpose.
    pub fn retrieval_document(&self) -> String {
        format!("{} {}", self.service_name, self.description)
    }
}
