//! JSON extractor whose rejections are always `400 Bad Request`.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

/// Like [`axum::Json`], but every rejection (missing content type, bad
/// syntax, missing field, wrong type) is answered with `400` and a JSON
/// string describing the problem, instead of axum's 415/422.
///
/// # Example
/// ```ignore
/// async fn create(JsonBody(payload): JsonBody<CreateThing>) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

/// Rejection produced by [`JsonBody`].
#[derive(Debug)]
pub struct JsonBodyRejection(JsonRejection);

impl JsonBodyRejection {
    /// Human-readable description of why the body was rejected.
    pub fn message(&self) -> String {
        self.0.body_text()
    }
}

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = JsonBodyRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(JsonBodyRejection)?;
        Ok(JsonBody(value))
    }
}

impl IntoResponse for JsonBodyRejection {
    fn into_response(self) -> Response {
        let message = self.message();
        tracing::warn!(status = %self.0.status(), "Rejected request body: {}", message);
        (StatusCode::BAD_REQUEST, Json(message)).into_response()
    }
}
