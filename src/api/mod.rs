mod handlers;
pub mod middleware;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::Engine;

/// Shared state for every request.
///
/// Project names in request paths resolve to directories directly under
/// `workspace`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub workspace: PathBuf,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            workspace: workspace.into(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Journal
        .route("/projects/{name}/journal", post(handlers::start_journal))
        .route("/projects/{name}/entries", get(handlers::list_entries))
        .route("/projects/{name}/entries", post(handlers::append_entry))
        // Snapshot
        .route("/projects/{name}/snapshot", get(handlers::get_snapshot))
        .route("/projects/{name}/compact", post(handlers::compact))
        .route("/projects/{name}/commit", post(handlers::retry_commit))
        .route("/projects/{name}/status", get(handlers::commit_status))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
