use std::sync::Arc;

use canvas_agent::config::{AgentConfig, parse_canvas_ids};
use canvas_agent::db;
use canvas_agent::llm::LlmClient;
use canvas_agent::services::oracle::{CommandOracle, LlmOracle, OfflineOracle};
use canvas_agent::services::orchestrator::{Orchestrator, spawn_canvas_consumer};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let (canvas_ids, invalid) = parse_canvas_ids(&std::env::var("CANVAS_IDS").unwrap_or_default());
    for entry in &invalid {
        tracing::warn!(entry = %entry, "ignoring malformed CANVAS_IDS entry");
    }
    if canvas_ids.is_empty() {
        tracing::error!("CANVAS_IDS lists no canvases; nothing to do");
        return;
    }

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");
    let config = AgentConfig::from_env();

    // Non-fatal: without a model the deterministic parser still runs.
    let oracle: Arc<dyn CommandOracle> = match LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Arc::new(LlmOracle::new(Arc::new(client), config))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; using the offline parser only");
            Arc::new(OfflineOracle)
        }
    };

    let (stores, queue) = db::stores(&pool);
    let _listener = queue.spawn_listener();
    let orchestrator = Arc::new(Orchestrator::new(stores, oracle, config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumers: Vec<_> = canvas_ids
        .iter()
        .map(|canvas_id| spawn_canvas_consumer(orchestrator.clone(), *canvas_id, shutdown_rx.clone()))
        .collect();
    tracing::info!(canvases = canvas_ids.len(), "canvas-agent running");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    for consumer in consumers {
        if let Err(e) = consumer.await {
            tracing::warn!(error = %e, "consumer task ended abnormally");
        }
    }
}
