//! Remote (HTTP-exposed) broker variant (§4.1).
//!
//! Wraps [`InMemoryBroker`] behind four endpoints so out-of-process services
//! and control planes can reach the same broker instance. Consumer delivery
//! to *remote* consumers still happens from inside the wrapped broker's
//! scheduler loop (`POST {callback_url}`); this module only adds the
//! inbound surface other processes use to publish/register/deregister.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::consumer::Consumer;
use super::in_memory::InMemoryBroker;
use super::traits::MessageBroker;
use crate::message::QueueMessage;
use crate::util::ConsumerId;

/// Request body for `POST /register_consumer`: a remote consumer identifies
/// itself by the callback URL the broker should `POST` deliveries to.
#[derive(Debug, Deserialize)]
pub struct RegisterConsumerRequest {
    pub consumer_id: ConsumerId,
    pub message_type: String,
    pub callback_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DeregisterConsumerRequest {
    pub consumer_id: ConsumerId,
    pub message_type: String,
}

#[derive(Debug, Serialize)]
pub struct ConsumerSummary {
    pub consumer_id: ConsumerId,
    pub message_type: String,
    pub is_remote: bool,
}

impl From<Consumer> for ConsumerSummary {
    fn from(c: Consumer) -> Self {
        Self {
            consumer_id: c.id,
            message_type: c.message_type.clone(),
            is_remote: c.is_remote(),
        }
    }
}

/// Builds the axum router exposing `broker` over HTTP.
pub fn router(broker: InMemoryBroker) -> Router {
    Router::new()
        .route("/publish", post(publish))
        .route("/register_consumer", post(register_consumer))
        .route("/deregister_consumer", post(deregister_consumer))
        .route("/list_consumers/{message_type}", get(list_consumers))
        .with_state(Arc::new(broker))
}

async fn publish(State(broker): State<Arc<InMemoryBroker>>, Json(message): Json<QueueMessage>) -> impl IntoResponse {
    match broker.publish(message).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => (StatusCode::BAD_GATEWAY, err.to_string()).into_response(),
    }
}

async fn register_consumer(
    State(broker): State<Arc<InMemoryBroker>>,
    Json(req): Json<RegisterConsumerRequest>,
) -> impl IntoResponse {
    let consumer = Consumer::remote(req.consumer_id, req.message_type, req.callback_url);
    match broker.register_consumer(consumer).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => (StatusCode::CONFLICT, err.to_string()).into_response(),
    }
}

async fn deregister_consumer(
    State(broker): State<Arc<InMemoryBroker>>,
    Json(req): Json<DeregisterConsumerRequest>,
) -> impl IntoResponse {
    match broker.deregister_consumer(&req.message_type, &req.consumer_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn list_consumers(State(broker): State<Arc<InMemoryBroker>>, Path(message_type): Path<String>) -> impl IntoResponse {
    let consumers = broker.get_consumers(&message_type).await;
    let summaries: Vec<ConsumerSummary> = consumers.into_iter().map(ConsumerSummary::from).collect();
    Json(summaries)
}
