//! Application state management.

use domain_search::{PgVectorStore, SearchService};
use std::sync::Arc;

/// Shared application state.
///
/// Cloned per request; only the `Arc` is copied.
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// Shared with the `/api` router, so readiness probes the same pool
    pub search: Arc<SearchService<PgVectorStore>>,
}
