use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

/// Upper bound on `limit` accepted from callers.
const MAX_QUERY_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub context_ids: Vec<String>,
    #[serde(default)]
    pub query: String,
    pub limit: Option<usize>,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, state.service_key.as_ref())?;

    let limit = payload
        .limit
        .unwrap_or_else(|| state.rag.default_query_limit())
        .min(MAX_QUERY_LIMIT);
    let results = state
        .rag
        .query_contexts_detailed(&payload.context_ids, &payload.query, limit)
        .await;

    Ok(Json(json!({ "results": results })))
}
