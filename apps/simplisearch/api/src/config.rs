use core_config::{AppInfo, FromEnv, app_info, env_parse, server::ServerConfig};
use database::postgres::PostgresConfig;
use domain_search::EmbeddingConfig;
use std::time::Duration;

pub use core_config::Environment;

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
    /// Upper bound on each embedding or store call made for a request
    pub request_timeout: Duration,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // DB_* with local defaults
        let embedding = EmbeddingConfig::from_env()?; // MODEL_CACHE_DIR, EMBEDDING_DIMENSION, ...
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080
        let timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", "30")?;

        if timeout_secs == 0 {
            eyre::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            app: app_info!(),
            database,
            embedding,
            server,
            request_timeout: Duration::from_secs(timeout_secs),
            environment,
        })
    }
}
