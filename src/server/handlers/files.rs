use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::rag::{strip_file_marker, FileDescriptor};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexFileRequest {
    pub file_name: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub text: String,
}

fn default_mime_type() -> String {
    "text/plain".to_string()
}

/// Queue a full re-index of one file and return before it runs.
pub async fn index_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((context_id, file_id)): Path<(String, String)>,
    Json(payload): Json<IndexFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, state.service_key.as_ref())?;
    validate_id("context_id", &context_id)?;
    validate_id("file_id", &file_id)?;
    if payload.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("file_name is required".to_string()));
    }

    let file = FileDescriptor {
        context_id,
        file_id,
        file_name: payload.file_name,
        mime_type: payload.mime_type,
    };
    let ticket = state.scheduler.submit(file, payload.text);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": ticket.job_id })),
    ))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((context_id, file_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, state.service_key.as_ref())?;
    validate_id("context_id", &context_id)?;
    validate_id("file_id", &file_id)?;

    let deleted = state.rag.delete_file_vectors(&context_id, &file_id).await;
    Ok(Json(json!({ "status": if deleted { "deleted" } else { "skipped" } })))
}

/// Stored chunks of a file, ordered by `chunk_index`.
pub async fn list_chunks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((context_id, file_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, state.service_key.as_ref())?;
    validate_id("context_id", &context_id)?;
    validate_id("file_id", &file_id)?;

    let chunks = state.rag.file_chunks(&context_id, &file_id).await?;
    let result: Vec<Value> = chunks
        .into_iter()
        .map(|chunk| {
            json!({
                "chunk_index": chunk.chunk_index,
                "text": strip_file_marker(&chunk.text),
                "source_file_name": chunk.source_file_name,
                "mime_type": chunk.mime_type,
            })
        })
        .collect();
    Ok(Json(json!({ "chunks": result })))
}

pub(crate) fn validate_id(name: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{name} cannot be empty")));
    }
    Ok(())
}
