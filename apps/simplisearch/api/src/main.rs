use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_search::{ApiDoc, OnnxEmbeddingProvider, PgVectorStore, SearchService};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    // Both of these are fatal: the service never serves without a model and a schema.
    let embedder = OnnxEmbeddingProvider::new(config.embedding.clone());
    embedder
        .initialize()
        .map_err(|e| eyre::eyre!("Embedding model initialization failed: {}", e))?;

    info!(
        url = %config.database.redacted_url(),
        "Connecting to PostgreSQL"
    );
    let store = PgVectorStore::connect(&config.database, config.embedding.dimension)
        .await
        .map_err(|e| eyre::eyre!("Vector store initialization failed: {}", e))?;

    let search = SearchService::new(store.clone(), Arc::new(embedder))
        .with_request_timeout(config.request_timeout);

    let state = AppState {
        config,
        search: Arc::new(search),
    };

    let router = axum_helpers::create_router::<ApiDoc>(api::routes(&state));

    // - /health: liveness check with app name/version
    // - /ready: readiness check against the vector store
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()));

    log_banner(&state.config);

    create_production_app(
        app,
        &state.config.server,
        Duration::from_secs(30), // 30s graceful shutdown timeout
        async move {
            info!("Shutting down: closing database connections");
            store.close().await;
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("SimpliSearch API shutdown complete");
    Ok(())
}

fn log_banner(config: &Config) {
    let base = format!("http://{}", config.server.address());
    info!(
        name = config.app.name,
        version = config.app.version,
        model = %config.embedding.model_name,
        dimension = config.embedding.dimension,
        "SimpliSearch ready to start"
    );
    info!("  POST {base}/api/add     {{\"key\": \"doc1\", \"text\": \"the quick brown fox\", \"metadata\": {{\"source\": \"example\"}}}}");
    info!("  POST {base}/api/search  {{\"query\": \"quick fox\", \"top_k\": 5, \"threshold\": 0.6}}");
    info!("  GET  {base}/health | {base}/ready | {base}/api-docs/openapi.json");
}
