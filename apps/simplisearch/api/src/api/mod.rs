use axum::Router;

pub mod health;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix will be added by the `create_router` helper.
pub fn routes(state: &crate::state::AppState) -> Router {
    domain_search::handlers::router_with_shared(state.search.clone())
}

/// Creates a router with the /ready endpoint that checks the vector store.
///
/// This router has state applied and can be merged with the stateless app router
/// from `create_router`.
pub fn ready_router(state: crate::state::AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
