//! Server infrastructure module.
//!
//! - Router assembly with the OpenAPI document
//! - Health and readiness endpoints
//! - Graceful shutdown coordination
//!
//! # Example
//!
//! ```ignore
//! use axum_helpers::server::{create_production_app, create_router, health_router};
//! use core_config::app_info;
//!
//! let router = create_router::<ApiDoc>(api_routes).merge(health_router(app_info!()));
//! create_production_app(router, &config.server, Duration::from_secs(30), cleanup).await?;
//! ```

pub mod app;
pub mod health;
pub mod shutdown;

pub use app::{create_production_app, create_router};
pub use health::{HealthCheckFuture, HealthResponse, health_router, run_health_checks};
pub use shutdown::ShutdownCoordinator;
