//! The `agentmesh` launcher binary (§9.1): wires the broker, control plane,
//! KV store, and orchestrator together, either in-process (`local`) or as
//! an HTTP server (`server`). Exits 0 on clean shutdown, nonzero on an
//! unrecoverable background-task failure (§6).

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use axum::Router;
use clap::Parser;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Layer 3: Internal module imports
use agentmesh_rt::broker::{self, MessageBroker};
use agentmesh_rt::cli::{Cli, Command};
use agentmesh_rt::config::RuntimeConfig;
use agentmesh_rt::control_plane::{self, BagOfWordsIndex, ControlPlane, ServiceIndex, ServiceRegistry, TaskStore};
use agentmesh_rt::kv::{InMemoryKvStore, KvStore};
use agentmesh_rt::message::TaskDefinition;
use agentmesh_rt::orchestrator::{Orchestrator, PipelineOrchestrator};
use agentmesh_rt::service::{self, Component, ComponentService, Service};
use agentmesh_rt::util::TaskId;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let cli = Cli::parse();
    let config = match RuntimeConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Command::Local { task } => run_local(config, task).await,
        Command::Server { pipeline } => run_server(config, pipeline).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("agentmesh: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Reverses one round of naive pig-latin encoding (`word + last-consonant +
/// "ay"` becomes `word`). Used by the `local` demo pipeline.
fn undo_pig_latin_word(word: &str) -> String {
    let Some(stem) = word.strip_suffix("ay") else {
        return word.to_string();
    };
    let mut chars: Vec<char> = stem.chars().collect();
    let Some(last) = chars.pop() else {
        return word.to_string();
    };
    let mut restored = String::with_capacity(stem.len());
    restored.push(last);
    restored.extend(chars);
    restored
}

struct UndoPigLatin;

#[async_trait]
impl Component for UndoPigLatin {
    async fn run_step(&self, input: &str, state: &HashMap<String, Value>) -> (String, HashMap<String, Value>, bool) {
        let output = input.split_whitespace().map(undo_pig_latin_word).collect::<Vec<_>>().join(" ");
        (output, state.clone(), true)
    }
}

/// `local` (§9.1): a single process wiring an in-memory broker and KV store
/// around a one-step demo pipeline, submitting `task_input` and printing
/// its result.
async fn run_local(config: RuntimeConfig, task_input: String) -> anyhow::Result<()> {
    let in_memory_broker = broker::InMemoryBroker::default();
    let broker: Arc<dyn MessageBroker> = Arc::new(in_memory_broker.clone());

    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
    let index: Arc<dyn ServiceIndex> = Arc::new(BagOfWordsIndex::new());
    let registry = ServiceRegistry::new(kv.clone(), index, config.services_retrieval_threshold, config.top_k);
    let task_store = TaskStore::new(kv);
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(PipelineOrchestrator::new(vec!["remove_ay_agent".to_string()]));
    let control_plane = Arc::new(ControlPlane::new(registry, task_store, orchestrator, broker.clone()));
    control_plane::register_to_message_queue(control_plane.clone(), broker.as_ref()).await?;

    let demo_service = Arc::new(ComponentService::new(
        "remove_ay_agent",
        "undoes one round of naive pig latin encoding",
        Arc::new(UndoPigLatin),
        broker.clone(),
    ));
    service::register_to_message_queue(demo_service.clone(), broker.as_ref()).await?;
    control_plane.register_service(demo_service.service_definition()).await?;
    let (service_handle, service_shutdown) = service::spawn_processing_loop(demo_service);

    let broker_handle = {
        let in_memory_broker = in_memory_broker.clone();
        tokio::spawn(async move { in_memory_broker.run().await })
    };

    let task = TaskDefinition::new(TaskId::new(), task_input);
    let task_id = task.task_id;
    control_plane.submit_task(task).await?;

    let deadline = Instant::now() + Duration::from_secs(5);
    let result = loop {
        if let Some(result) = control_plane.get_result(task_id).await? {
            break result;
        }
        if Instant::now() >= deadline {
            anyhow::bail!("task {task_id} did not complete within the demo timeout");
        }
        tokio::time::sleep(config.step_interval).await;
    };

    let _ = service_shutdown.send(());
    service_handle.await?;
    in_memory_broker.stop();
    broker_handle.await?;

    println!("{}", result.result);
    Ok(())
}

/// `server` (§9.1): exposes the control plane and broker over HTTP so
/// services register and exchange messages out-of-process. `pipeline`
/// seeds a [`PipelineOrchestrator`] over the named services; an empty list
/// leaves every task undecidable, which is the right failure mode for a
/// freshly-started deployment an operator hasn't configured yet.
async fn run_server(config: RuntimeConfig, pipeline: Vec<String>) -> anyhow::Result<()> {
    let in_memory_broker = broker::InMemoryBroker::default();
    let broker: Arc<dyn MessageBroker> = Arc::new(in_memory_broker.clone());

    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
    let index: Arc<dyn ServiceIndex> = Arc::new(BagOfWordsIndex::new());
    let registry = ServiceRegistry::new(kv.clone(), index, config.services_retrieval_threshold, config.top_k);
    registry.load().await?;
    let task_store = TaskStore::new(kv);
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(PipelineOrchestrator::new(pipeline));
    let control_plane = Arc::new(ControlPlane::new(registry, task_store, orchestrator, broker.clone()));
    control_plane::register_to_message_queue(control_plane.clone(), broker.as_ref()).await?;

    let broker_handle = {
        let in_memory_broker = in_memory_broker.clone();
        tokio::spawn(async move { in_memory_broker.run().await })
    };

    let app = Router::new()
        .nest("/broker", broker::http::router(in_memory_broker.clone()))
        .merge(control_plane::http::router(control_plane));

    let bind_address = format!("{}:{}", config.control_plane_host, config.control_plane_port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(%bind_address, "agentmesh control plane listening");
    axum::serve(listener, app).await?;

    in_memory_broker.stop();
    broker_handle.await?;
    Ok(())
}
