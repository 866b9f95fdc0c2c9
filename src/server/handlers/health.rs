use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let collection = state.rag.collection();
    let (status, store_status) = match state.rag.health().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(err) => {
            tracing::warn!("Health check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "vector_store": {
                "backend": state.rag.backend(),
                "status": store_status,
            },
            "collection": collection.name,
            "dimension": collection.dimension,
            "distance": collection.distance,
        })),
    )
}
