//! Similarity retrieval across a set of contexts.

use std::sync::Arc;

use serde::Serialize;

use super::collection::VectorCollection;
use super::embedding::EmbeddingBatcher;
use super::error::RagError;
use super::store::{ChunkPayload, PointFilter};

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub context_id: String,
    pub file_id: String,
    pub chunk_index: usize,
    pub source_file_name: String,
    pub score: f32,
}

pub struct VectorRetriever {
    collection: Arc<VectorCollection>,
    batcher: EmbeddingBatcher,
}

impl VectorRetriever {
    pub fn new(collection: Arc<VectorCollection>, batcher: EmbeddingBatcher) -> Self {
        Self {
            collection,
            batcher,
        }
    }

    /// Best `limit` chunks tagged with any of `context_ids`, best first.
    ///
    /// Returns immediately, without embedding or touching the store, when
    /// there is nothing to search for.
    pub async fn query_contexts(
        &self,
        context_ids: &[String],
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        if context_ids.is_empty() || query_text.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.batcher.embed_one(query_text.trim()).await?;

        self.collection.ensure().await?;

        let filter = PointFilter::any_context(context_ids.iter().cloned());
        let mut points = self
            .collection
            .store()
            .search(self.collection.name(), &query_vector, &filter, limit)
            .await?;
        points.truncate(limit);

        Ok(points
            .into_iter()
            .map(|point| RetrievedChunk {
                text: point.payload.text,
                context_id: point.payload.context_id,
                file_id: point.payload.file_id,
                chunk_index: point.payload.chunk_index,
                source_file_name: point.payload.source_file_name,
                score: point.score,
            })
            .collect())
    }

    /// Stored chunks of one file ordered by `chunk_index`.
    pub async fn file_chunks(
        &self,
        context_id: &str,
        file_id: &str,
    ) -> Result<Vec<ChunkPayload>, RagError> {
        self.collection.ensure().await?;
        let mut chunks = self
            .collection
            .store()
            .scroll(self.collection.name(), &PointFilter::file(context_id, file_id))
            .await?;
        chunks.sort_by_key(|chunk| chunk.chunk_index);
        Ok(chunks)
    }

    pub async fn count_context_vectors(&self, context_id: &str) -> Result<usize, RagError> {
        self.collection.ensure().await?;
        self.collection
            .store()
            .count(self.collection.name(), &PointFilter::context(context_id))
            .await
    }
}

/// Strip the `[File: ...]` marker the indexer prepends to every chunk.
pub fn strip_file_marker(text: &str) -> &str {
    match text.strip_prefix("[File: ") {
        Some(rest) => rest.split_once("]\n").map_or(text, |(_, body)| body),
        None => text,
    }
}
