//! The per-service HTTP surface: `GET /`, `POST /process_message`,
//! `POST /task`, `GET /messages`, admin toggles (§6).

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Serialize;

// Layer 3: Internal module imports
use super::contract::Service;
use crate::message::{QueueMessage, TaskDefinition};

const MESSAGE_LOG_CAPACITY: usize = 100;

/// Summary of a processed message, kept for `GET /messages` (§6). Full
/// payloads aren't retained — this is an admin/debugging surface, not a
/// durability guarantee.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub r#type: String,
    pub action: String,
}

impl From<&QueueMessage> for MessageSummary {
    fn from(message: &QueueMessage) -> Self {
        Self {
            id: message.id.to_string(),
            r#type: message.r#type.clone(),
            action: message.action.to_string(),
        }
    }
}

struct RouterState<S> {
    service: Arc<S>,
    log: Mutex<VecDeque<MessageSummary>>,
}

/// Builds the axum router exposing `service` over HTTP for `launch_server`
/// (§4.2).
pub fn router<S: Service>(service: Arc<S>) -> Router {
    let state = Arc::new(RouterState {
        service,
        log: Mutex::new(VecDeque::with_capacity(MESSAGE_LOG_CAPACITY)),
    });
    Router::new()
        .route("/", get(liveness::<S>))
        .route("/process_message", post(process_message::<S>))
        .route("/task", post(submit_task::<S>))
        .route("/messages", get(list_messages::<S>))
        .route("/pause", post(pause::<S>))
        .route("/resume", post(resume::<S>))
        .with_state(state)
}

#[derive(Serialize)]
struct Liveness {
    service_name: String,
    paused: bool,
}

async fn liveness<S: Service>(State(state): State<Arc<RouterState<S>>>) -> impl IntoResponse {
    Json(Liveness {
        service_name: state.service.service_definition().service_name,
        paused: state.service.control().is_paused(),
    })
}

fn record<S>(state: &RouterState<S>, message: &QueueMessage) {
    let mut log = state.log.lock();
    if log.len() == MESSAGE_LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(MessageSummary::from(message));
}

async fn process_message<S: Service>(State(state): State<Arc<RouterState<S>>>, Json(message): Json<QueueMessage>) -> impl IntoResponse {
    record(&state, &message);
    match state.service.process_message(message).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

async fn submit_task<S: Service>(State(state): State<Arc<RouterState<S>>>, Json(task): Json<TaskDefinition>) -> impl IntoResponse {
    let topic = state.service.service_definition().service_name;
    let message = match QueueMessage::with_payload("http_client", topic, crate::message::Action::NewTask, &task) {
        Ok(message) => message,
        Err(err) => return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    };
    record(&state, &message);
    match state.service.process_message(message).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

async fn list_messages<S: Service>(State(state): State<Arc<RouterState<S>>>) -> impl IntoResponse {
    Json(state.log.lock().iter().cloned().collect::<Vec<_>>())
}

async fn pause<S: Service>(State(state): State<Arc<RouterState<S>>>) -> impl IntoResponse {
    state.service.control().pause();
    StatusCode::NO_CONTENT
}

async fn resume<S: Service>(State(state): State<Arc<RouterState<S>>>) -> impl IntoResponse {
    state.service.control().resume();
    StatusCode::NO_CONTENT
}
