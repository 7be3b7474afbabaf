use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, artifact_root: impl AsRef<Path>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Persistent capture connection
        .route("/ws/capture", get(handlers::capture_ws))
        // Finished artifacts, retrievable even after the connection is gone
        .nest_service("/artifacts", ServeDir::new(artifact_root.as_ref()))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
