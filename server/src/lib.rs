//! HTTP API for the Lockbox sync server.
//!
//! Exposes one account's entries to the sync client. The routes and bodies
//! are defined in [`lockbox_sync::protocol`].

pub mod auth;
pub mod error;
pub mod handlers;

use auth::auth_middleware;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use lockbox_storage::ServerStore;
use tower_http::trace::TraceLayer;

pub use error::ServerError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: ServerStore,
}

impl AppState {
    pub fn new(store: ServerStore) -> Self {
        Self { store }
    }
}

/// Build the HTTP API router over the given store.
pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/api/v1/{class}/summaries", get(handlers::summaries))
        .route(
            "/api/v1/{class}/entries",
            get(handlers::all_entries)
                .post(handlers::insert_entries)
                .put(handlers::update_entries),
        )
        .route("/api/v1/{class}/entries/fetch", post(handlers::fetch_entries))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(authenticated)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
