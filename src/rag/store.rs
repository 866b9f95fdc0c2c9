//! VectorStore trait: the interface every vector-store backend implements.
//!
//! The production backend is Qdrant over gRPC (`qdrant` module); the
//! embedded SQLite backend (`sqlite` module) serves single-node setups and
//! tests. Both speak the same payload shape so a collection can be moved
//! between them by re-indexing.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::RagError;
use crate::vector_math;

/// Similarity metric fixed at collection creation.
///
/// Config and JSON accept the same spellings as `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    /// Score where larger always means more similar.
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Distance::Cosine => vector_math::cosine_similarity(query, candidate),
            Distance::Dot => vector_math::dot(query, candidate),
            Distance::Euclid => -vector_math::euclidean_distance(query, candidate),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Distance::Cosine => "cosine",
            Distance::Dot => "dot",
            Distance::Euclid => "euclid",
        };
        f.write_str(name)
    }
}

impl TryFrom<String> for Distance {
    type Error = RagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Distance {
    type Err = RagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "dot" => Ok(Distance::Dot),
            "euclid" | "euclidean" => Ok(Distance::Euclid),
            other => Err(RagError::Configuration(format!(
                "unsupported distance metric '{other}'"
            ))),
        }
    }
}

/// Name, dimension and metric of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
}

/// Metadata stored alongside every vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub context_id: String,
    pub file_id: String,
    pub chunk_index: usize,
    /// Chunk text, already prefixed with its `[File: ...]` marker.
    pub text: String,
    pub source_file_name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    /// Similarity score (higher = better).
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Payload filter understood by every backend.
///
/// `context_ids` is an any-of match; `file_id`, when present, must also
/// match. An empty `context_ids` list matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointFilter {
    pub context_ids: Vec<String>,
    pub file_id: Option<String>,
}

impl PointFilter {
    pub fn file(context_id: &str, file_id: &str) -> Self {
        Self {
            context_ids: vec![context_id.to_string()],
            file_id: Some(file_id.to_string()),
        }
    }

    pub fn context(context_id: &str) -> Self {
        Self {
            context_ids: vec![context_id.to_string()],
            file_id: None,
        }
    }

    pub fn any_context<I, S>(context_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = Vec::new();
        for id in context_ids {
            let id = id.into();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self {
            context_ids: ids,
            file_id: None,
        }
    }

    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        self.context_ids.iter().any(|id| *id == payload.context_id)
            && self
                .file_id
                .as_ref()
                .map_or(true, |file_id| *file_id == payload.file_id)
    }
}

/// Abstract trait for vector-store backends.
///
/// Implementations must:
/// - never alter an existing collection's dimension or metric
/// - acknowledge `upsert` only once the points are durable
/// - treat deletes matching nothing as success
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs and health output (e.g. "qdrant", "sqlite").
    fn backend(&self) -> &str;

    /// Verify the backend is reachable and accepts our credentials.
    async fn health_check(&self) -> Result<(), RagError>;

    /// Describe a collection, or `None` when it does not exist.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionSpec>, RagError>;

    /// Create a collection. Fails if it already exists.
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), RagError>;

    /// Insert or replace points by id, waiting for durability.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), RagError>;

    /// Delete every point matching the filter.
    async fn delete(&self, collection: &str, filter: &PointFilter) -> Result<(), RagError>;

    /// Nearest neighbours of `vector` among points matching the filter,
    /// best first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError>;

    /// All payloads matching the filter (no ordering guarantee).
    async fn scroll(
        &self,
        collection: &str,
        filter: &PointFilter,
    ) -> Result<Vec<ChunkPayload>, RagError>;

    /// Number of points matching the filter.
    async fn count(&self, collection: &str, filter: &PointFilter) -> Result<usize, RagError>;
}
