//! The service contract shared by every worker kind (§4.2).

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::interval;
use tracing::warn;

// Layer 3: Internal module imports
use super::error::ServiceError;
use crate::broker::{Consumer, ConsumerHandler, ConsumerTarget, MessageBroker};
use crate::message::{QueueMessage, ServiceDefinition};
use crate::util::ConsumerId;

/// An admin-toggleable pause flag, shared between a service's HTTP surface
/// and its `processing_loop` (§6 "admin toggles").
#[derive(Debug, Default)]
pub struct ServiceControl {
    paused: AtomicBool,
}

impl ServiceControl {
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

/// Implemented by every worker kind: agent, tool, human, component (§4.2).
///
/// A service is reached solely by topic name (its `service_name`) — it never
/// holds a reference to the control plane or to other services, only to the
/// broker's publish operation (§9 "no component owns another").
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// This service's registration record.
    fn service_definition(&self) -> ServiceDefinition;

    /// How often `processing_loop` steps outstanding work. Defaults to a
    /// tight cadence suitable for tests; real deployments override via
    /// `RuntimeConfig::step_interval`.
    fn step_interval(&self) -> Duration {
        Duration::from_millis(50)
    }

    /// Shared pause flag consulted by the spawned processing loop.
    fn control(&self) -> &ServiceControl;

    /// Handle one delivered `QueueMessage`. Dispatch on `message.action` is
    /// this service's responsibility (§9: no dynamic class dispatch, a
    /// closed enum plus a handler table).
    async fn process_message(&self, message: QueueMessage) -> Result<(), ServiceError>;

    /// Advance outstanding work by one step. Called once per tick by the
    /// spawned processing loop.
    async fn step(&self) -> Result<(), ServiceError>;
}

struct ServiceHandler<S>(Arc<S>);

#[async_trait]
impl<S: Service> ConsumerHandler for ServiceHandler<S> {
    async fn handle(&self, message: QueueMessage) -> Result<(), crate::broker::BrokerError> {
        self.0
            .process_message(message)
            .await
            .map_err(|e| crate::broker::BrokerError::ConsumerHandlerFailed(e.to_string()))
    }
}

/// Build the broker consumer binding for `service` (§4.2 `as_consumer`).
///
/// `remote` selects a [`ConsumerTarget::Remote`] callback URL instead of an
/// in-process handler, for services running under `launch_server`.
pub fn as_consumer<S: Service>(service: Arc<S>, remote: Option<&str>) -> Consumer {
    let name = service.service_definition().service_name;
    match remote {
        Some(callback_url) => Consumer {
            id: ConsumerId::new(),
            message_type: name,
            target: ConsumerTarget::Remote {
                callback_url: callback_url.to_string(),
            },
        },
        None => Consumer::local(ConsumerId::new(), name, Arc::new(ServiceHandler(service))),
    }
}

/// Bind `service` to its topic on `broker` — the "start-consuming" handle of
/// §4.1 is the broker's own `run()` loop, shared across every consumer.
pub async fn register_to_message_queue<S: Service>(
    service: Arc<S>,
    broker: &dyn MessageBroker,
) -> Result<(), ServiceError> {
    broker.register_consumer(as_consumer(service, None)).await?;
    Ok(())
}

/// `POST {control_plane_url}/services/register` with this service's
/// definition (§4.2, §6).
pub async fn register_to_control_plane<S: Service>(service: &S, control_plane_url: &str) -> Result<(), ServiceError> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{control_plane_url}/services/register"))
        .json(&service.service_definition())
        .send()
        .await
        .map_err(|e| ServiceError::Http(e.to_string()))?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(ServiceError::Http(format!(
            "control plane rejected registration: {}",
            response.status()
        )))
    }
}

/// Spawn the processing loop: ticks at `service.step_interval()`, calling
/// `step()` unless paused, until the returned sender is dropped or fired.
pub fn spawn_processing_loop<S: Service>(service: Arc<S>) -> (tokio::task::JoinHandle<()>, oneshot::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let mut ticker = interval(service.step_interval());
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    if service.control().is_paused() {
                        continue;
                    }
                    if let Err(err) = service.step().await {
                        warn!(service = %service.service_definition().service_name, error = %err, "service step failed");
                    }
                }
            }
        }
    });
    (handle, shutdown_tx)
}

/// Register `service` on the broker and with the control plane, then spawn
/// its processing loop — the in-process launch path (§4.2 `launch_local`).
pub async fn launch_local<S: Service>(
    service: Arc<S>,
    broker: Arc<dyn MessageBroker>,
    control_plane_url: &str,
) -> Result<(tokio::task::JoinHandle<()>, oneshot::Sender<()>), ServiceError> {
    register_to_message_queue(service.clone(), broker.as_ref()).await?;
    register_to_control_plane(service.as_ref(), control_plane_url).await?;
    Ok(spawn_processing_loop(service))
}
