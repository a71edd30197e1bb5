pub mod handlers;

use serde::Serialize;
use utoipa::ToSchema;

/// Error body for responses produced by the shared plumbing (404 fallback).
///
/// Domain handlers define their own error bodies.
///
/// ```json
/// { "error": "NotFound", "message": "The requested resource was not found" }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
