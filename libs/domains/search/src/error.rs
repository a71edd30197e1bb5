use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_helpers::JsonBodyRejection;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Embedding model is not initialized")]
    NotInitialized,

    #[error("Embedding failed: {0}")]
    Inference(String),

    #[error("Failed to connect to database: {0}")]
    Connect(String),

    #[error("Lost connection to database: {0}")]
    ConnectionLost(String),

    #[error("Failed to store vector: {0}")]
    Write(String),

    #[error("Failed to search vectors: {0}")]
    Read(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

pub type SearchResult<T> = Result<T, SearchError>;

impl SearchError {
    /// Startup errors: the process must not serve traffic after one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SearchError::ModelNotFound(_) | SearchError::ModelLoad(_) | SearchError::Connect(_)
        )
    }
}

impl From<JsonBodyRejection> for SearchError {
    fn from(rejection: JsonBodyRejection) -> Self {
        SearchError::MalformedRequest(rejection.message())
    }
}

/// Every failure reaches the client as `400` with the message as a JSON string.
impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        if self.is_fatal() {
            tracing::error!(error = %message, "Request failed with a startup-class error");
        } else {
            tracing::warn!(error = %message, "Request failed");
        }
        (StatusCode::BAD_REQUEST, Json(message)).into_response()
    }
}
