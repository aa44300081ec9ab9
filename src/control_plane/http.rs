//! The control plane's HTTP surface (§6): service registry management and
//! task submission/inspection.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::dispatch::ControlPlane;
use crate::message::{ServiceDefinition, TaskDefinition};
use crate::util::TaskId;

#[derive(Debug, Deserialize)]
struct DeregisterServiceRequest {
    service_name: String,
}

#[derive(Debug, Serialize)]
struct Liveness {
    service_count: usize,
}

fn parse_task_id(raw: &str) -> Result<TaskId, (StatusCode, String)> {
    Uuid::parse_str(raw)
        .map(TaskId::from_uuid)
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid task_id: {raw}")))
}

/// Builds the axum router exposing `control_plane` over HTTP (§6 control
/// plane surface table).
pub fn router(control_plane: Arc<ControlPlane>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/services/register", post(register_service))
        .route("/services/deregister", post(deregister_service))
        .route("/services", get(list_services))
        .route("/tasks", post(submit_task).get(list_tasks))
        .route("/tasks/{task_id}", get(get_task))
        .route("/tasks/{task_id}/result", get(get_result))
        .with_state(control_plane)
}

async fn liveness(State(control_plane): State<Arc<ControlPlane>>) -> impl IntoResponse {
    Json(Liveness {
        service_count: control_plane.list_services().len(),
    })
}

async fn register_service(State(control_plane): State<Arc<ControlPlane>>, Json(definition): Json<ServiceDefinition>) -> impl IntoResponse {
    match control_plane.register_service(definition).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn deregister_service(State(control_plane): State<Arc<ControlPlane>>, Json(req): Json<DeregisterServiceRequest>) -> impl IntoResponse {
    match control_plane.deregister_service(&req.service_name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (StatusCode::NOT_FOUND, err.to_string()).into_response(),
    }
}

async fn list_services(State(control_plane): State<Arc<ControlPlane>>) -> impl IntoResponse {
    Json(control_plane.list_services())
}

async fn submit_task(State(control_plane): State<Arc<ControlPlane>>, Json(task): Json<TaskDefinition>) -> impl IntoResponse {
    match control_plane.submit_task(task).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn list_tasks(State(control_plane): State<Arc<ControlPlane>>) -> impl IntoResponse {
    match control_plane.list_tasks().await {
        Ok(tasks) => Json(tasks).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn get_task(State(control_plane): State<Arc<ControlPlane>>, Path(task_id): Path<String>) -> impl IntoResponse {
    let task_id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match control_plane.get_task(task_id).await {
        Ok(Some(persisted)) => Json(persisted).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "unknown task").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn get_result(State(control_plane): State<Arc<ControlPlane>>, Path(task_id): Path<String>) -> impl IntoResponse {
    let task_id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match control_plane.get_result(task_id).await {
        Ok(Some(result)) => Json(result).into_response(),
        Ok(None) => (StatusCode::ACCEPTED, "task still in flight").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, MessageBroker};
    use crate::control_plane::index::BagOfWordsIndex;
    use crate::control_plane::registry::ServiceRegistry;
    use crate::control_plane::task_store::TaskStore;
    use crate::kv::InMemoryKvStore;
    use crate::orchestrator::PipelineOrchestrator;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let broker: Arc<dyn MessageBroker> = Arc::new(InMemoryBroker::default());
        let registry = ServiceRegistry::new(Arc::new(InMemoryKvStore::new()), Arc::new(BagOfWordsIndex::new()), 10, 5);
        let tasks = TaskStore::new(Arc::new(InMemoryKvStore::new()));
        let orchestrator = Arc::new(PipelineOrchestrator::new(vec!["step_one".to_string()]));
        let control_plane = Arc::new(ControlPlane::new(registry, tasks, orchestrator, broker));
        router(control_plane)
    }

    #[tokio::test]
    async fn liveness_reports_zero_services_initially() {
        let response = app().oneshot(Request::builder().uri("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_list_services_roundtrips() {
        let app = app();
        let definition = ServiceDefinition::new("step_one", "the one step");
        let body = serde_json::to_vec(&definition).unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/services/register")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(Request::builder().uri("/services").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_task_then_fetch_it_back() {
        let app = app();
        let task = TaskDefinition::new(TaskId::new(), "hello");
        let task_id = task.task_id;
        let body = serde_json::to_vec(&task).unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app
            .oneshot(Request::builder().uri(format!("/tasks/{task_id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_task_with_malformed_id_is_bad_request() {
        let response = app()
            .oneshot(Request::builder().uri("/tasks/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_result_for_unknown_task_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(format!("/tasks/{}/result", TaskId::new()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deregister_unknown_service_is_not_found() {
        let req = DeregisterServiceRequest {
            service_name: "missing".to_string(),
        };
        let body = serde_json::to_vec(&req).unwrap();
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/services/deregister")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
