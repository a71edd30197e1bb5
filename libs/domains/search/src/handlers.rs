use axum::{Json, Router, extract::State, routing::post};
use axum_helpers::{JsonBody, JsonBodyRejection};
use serde_json::Value;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::SearchResult;
use crate::models::{ADD_SUCCESS_MESSAGE, AddRequest, Match, SearchRequest};
use crate::service::SearchService;
use crate::store::VectorStore;

const TAG: &str = "search";

/// OpenAPI documentation for the search API
#[derive(OpenApi)]
#[openapi(
    paths(add_vector, search_vectors),
    components(schemas(AddRequest, SearchRequest, Match)),
    tags(
        (name = TAG, description = "Semantic indexing and similarity search")
    )
)]
pub struct ApiDoc;

/// Create the search router: `POST /add` and `POST /search`
pub fn router<S: VectorStore + 'static>(service: SearchService<S>) -> Router {
    router_with_shared(Arc::new(service))
}

/// Same as [`router`] for a service that is also used elsewhere, e.g. by
/// readiness checks.
pub fn router_with_shared<S: VectorStore + 'static>(service: Arc<SearchService<S>>) -> Router {
    Router::new()
        .route("/add", post(add_vector::<S>))
        .route("/search", post(search_vectors::<S>))
        .with_state(service)
}

/// Embed a text and store it under a key
#[utoipa::path(
    post,
    path = "/add",
    tag = TAG,
    request_body = AddRequest,
    responses(
        (status = 200, description = "Vector stored", body = String),
        (status = 400, description = "Malformed body or processing failure", body = String)
    )
)]
async fn add_vector<S: VectorStore>(
    State(service): State<Arc<SearchService<S>>>,
    payload: Result<JsonBody<AddRequest>, JsonBodyRejection>,
) -> SearchResult<Json<&'static str>> {
    let JsonBody(request) = payload?;
    let metadata = match request.metadata {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(value) => value,
    };

    service.ingest(&request.key, &request.text, metadata).await?;
    Ok(Json(ADD_SUCCESS_MESSAGE))
}

/// Find stored records nearest to a query text
#[utoipa::path(
    post,
    path = "/search",
    tag = TAG,
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matches, most similar first", body = Vec<Match>),
        (status = 400, description = "Malformed body or processing failure", body = String)
    )
)]
async fn search_vectors<S: VectorStore>(
    State(service): State<Arc<SearchService<S>>>,
    payload: Result<JsonBody<SearchRequest>, JsonBodyRejection>,
) -> SearchResult<Json<Vec<Match>>> {
    let JsonBody(request) = payload?;
    let matches = service
        .search(&request.query, request.top_k, request.threshold)
        .await?;
    Ok(Json(matches))
}
