//! # Axum Helpers
//!
//! Shared HTTP plumbing for the SimpliSearch services.
//!
//! ## Modules
//!
//! - **[`server`]**: Router assembly, health checks, graceful shutdown
//! - **[`http`]**: Security headers middleware
//! - **[`errors`]**: Structured error body and the 404 fallback
//! - **[`extractors`]**: JSON body extractor that answers malformed input with 400
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum_helpers::server::{create_production_app, create_router};
//! use core_config::server::ServerConfig;
//! use utoipa::OpenApi;
//!
//! #[derive(OpenApi)]
//! #[openapi(paths())]
//! struct ApiDoc;
//!
//! let router = create_router::<ApiDoc>(api_routes);
//! create_production_app(router, &ServerConfig::default(), Duration::from_secs(30), async {}).await?;
//! ```

pub mod errors;
pub mod extractors;
pub mod http;
pub mod server;

pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_production_app, create_router,
    health_router, run_health_checks,
};

pub use http::security_headers;

pub use errors::ErrorResponse;

pub use extractors::{JsonBody, JsonBodyRejection};
