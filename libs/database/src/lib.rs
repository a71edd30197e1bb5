//! PostgreSQL connection plumbing shared by the SimpliSearch binaries.
//!
//! # Features
//!
//! - `postgres` (default) - SeaORM connection pool, connector and health probe
//! - `config` - `core_config::FromEnv` support for [`postgres::PostgresConfig`]
//!
//! # Example
//!
//! ```ignore
//! use database::postgres::{PostgresConfig, connect_from_config, check_health};
//!
//! let config = PostgresConfig::from_env()?;
//! let db = connect_from_config(&config).await?;
//! check_health(&db).await?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult};
