use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{contexts, files, health, query};
use crate::state::AppState;

/// Routes exposed to the rest of the backend.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.settings.server.max_body_bytes);

    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/contexts/:context_id/files/:file_id/index",
            post(files::index_file).layer(body_limit),
        )
        .route(
            "/api/contexts/:context_id/files/:file_id",
            delete(files::delete_file),
        )
        .route(
            "/api/contexts/:context_id/files/:file_id/chunks",
            get(files::list_chunks),
        )
        .route("/api/contexts/:context_id", delete(contexts::delete_context))
        .route("/api/query", post(query::query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
