use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::files::validate_id;
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

/// Remove every vector of a context, whatever file it came from.
pub async fn delete_context(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(context_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, state.service_key.as_ref())?;
    validate_id("context_id", &context_id)?;

    let deleted = state.rag.delete_context_vectors(&context_id).await;
    Ok(Json(json!({ "status": if deleted { "deleted" } else { "skipped" } })))
}
