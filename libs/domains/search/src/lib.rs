//! Semantic search domain
//!
//! Turns text into normalized sentence embeddings and keeps them in a keyed
//! vector store with cosine-similarity retrieval.
//!
//! - [`embedding`]: the [`EmbeddingProvider`] seam with an ONNX
//!   implementation and a deterministic hashing one
//! - [`store`]: the [`VectorStore`] seam backed by PostgreSQL + pgvector or
//!   an in-process store
//! - [`service`]: ingest and search orchestration with per-call timeouts
//! - [`handlers`]: the `/add` and `/search` HTTP endpoints

pub mod embedding;
pub mod error;
pub mod handlers;
pub mod models;
pub mod service;
pub mod store;

pub use embedding::{EmbeddingConfig, EmbeddingProvider, HashingEmbeddingProvider, OnnxEmbeddingProvider};
pub use error::{SearchError, SearchResult};
pub use handlers::ApiDoc;
pub use models::*;
pub use service::{DEFAULT_REQUEST_TIMEOUT, SearchService};
pub use store::{InMemoryVectorStore, PgConnector, PgVectorStore, VectorStore};
