//! Keyed vector persistence with cosine-similarity retrieval.

mod connection;
mod memory;
mod postgres;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SearchResult;
use crate::models::{Embedding, Match, Record};

pub use connection::{Connector, LiveConnection, Liveness, PgConnector};
pub use memory::InMemoryVectorStore;
pub use postgres::{PgVectorStore, TABLE_NAME};

/// Storage of `(key, vector, metadata)` records.
///
/// Keys are unique. Writing an existing key replaces its vector and
/// metadata in one atomic step and keeps its creation time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert `key`, or replace the vector and metadata stored under it.
    async fn upsert(&self, key: &str, vector: &Embedding, metadata: &Value) -> SearchResult<()>;

    /// Up to `top_k` records whose cosine distance to `vector` is strictly
    /// below `threshold`, nearest first. `top_k <= 0` yields nothing.
    async fn query(&self, vector: &Embedding, top_k: i64, threshold: f64)
    -> SearchResult<Vec<Match>>;

    /// The record stored under `key`, if any.
    async fn get(&self, key: &str) -> SearchResult<Option<Record>>;

    /// Cheap reachability probe for readiness checks.
    async fn health_check(&self) -> SearchResult<()>;
}
