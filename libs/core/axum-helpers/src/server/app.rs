use super::shutdown::ShutdownCoordinator;
use crate::errors::handlers::not_found;
use crate::http::security::security_headers;
use axum::{Json, Router, middleware, routing::get};
use core_config::server::ServerConfig;
use std::io;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Creates the service router with common middleware and documentation.
///
/// - API routes nested under `/api`
/// - OpenAPI JSON at [`OPENAPI_PATH`]
/// - Request tracing, security headers and response compression
/// - JSON 404 fallback
///
/// Health endpoints (`/health`, `/ready`) are merged by the app, see
/// [`health_router`](super::health::health_router). Domain routers apply
/// their own state before being passed in.
pub fn create_router<T>(apis: Router) -> Router
where
    T: OpenApi + 'static,
{
    let openapi = T::openapi();

    Router::new()
        .route(
            OPENAPI_PATH,
            get(move || {
                let doc = openapi.clone();
                async move { Json(doc) }
            }),
        )
        .nest("/api", apis)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(security_headers))
        .layer(CompressionLayer::new())
}

/// Serves `router` until SIGINT/SIGTERM, then runs `cleanup` bounded by
/// `shutdown_timeout`.
///
/// In-flight requests finish before the listener closes.
///
/// # Example
/// ```ignore
/// let cleanup = async move { store.close().await };
/// create_production_app(router, &config.server, Duration::from_secs(30), cleanup).await?;
/// ```
pub async fn create_production_app<F>(
    router: Router,
    server_config: &ServerConfig,
    shutdown_timeout: Duration,
    cleanup: F,
) -> io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let coordinator = ShutdownCoordinator::new();
    let mut shutdown_rx = coordinator.subscribe();

    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!("Server starting on {}", listener.local_addr()?);

    let signal_handle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.wait_for_signal().await })
    };

    let serve_result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        });

    signal_handle.abort();

    info!("Starting cleanup tasks (timeout: {:?})", shutdown_timeout);
    match tokio::time::timeout(shutdown_timeout, cleanup).await {
        Ok(_) => info!("Cleanup completed successfully"),
        Err(_) => tracing::warn!(
            "Cleanup exceeded timeout of {:?}, forcing shutdown",
            shutdown_timeout
        ),
    }

    serve_result
}
