//! Subsystem boundary: the four operations the rest of the backend calls.
//!
//! Internal components return `Result<_, RagError>`. This layer is the only
//! place that decides what happens to a failure: it logs the operation and
//! the identifiers involved, then degrades to a no-op or an empty result.

use std::sync::Arc;

use serde::Serialize;

use super::chunker::Chunker;
use super::collection::VectorCollection;
use super::deletion::DeletionOps;
use super::embedding::{EmbeddingBatcher, EmbeddingProvider, DEFAULT_EMBEDDING_BATCH_SIZE};
use super::error::{RagError, RagErrorKind};
use super::indexer::{FileDescriptor, IndexOutcome, VectorIndexer};
use super::locks::FileLocks;
use super::retriever::{RetrievedChunk, VectorRetriever};
use super::store::{ChunkPayload, CollectionSpec, Distance, VectorStore};

/// Tunables for the pipeline. Defaults match the production setup.
#[derive(Debug, Clone)]
pub struct RagOptions {
    pub collection: String,
    pub dimension: usize,
    pub distance: Distance,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub default_query_limit: usize,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            collection: "context_files".to_string(),
            dimension: 1536,
            distance: Distance::Cosine,
            chunk_size: 800,
            chunk_overlap: 160,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            max_concurrent_batches: 1,
            default_query_limit: 5,
        }
    }
}

/// Result of one indexing run as seen from outside the subsystem.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunStatus {
    Completed(IndexOutcome),
    Failed { kind: RagErrorKind, message: String },
}

impl RunStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, RunStatus::Failed { .. })
    }
}

pub struct RagService {
    collection: Arc<VectorCollection>,
    indexer: VectorIndexer,
    retriever: VectorRetriever,
    deletion: DeletionOps,
    default_query_limit: usize,
}

impl RagService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        options: RagOptions,
    ) -> Result<Self, RagError> {
        if options.dimension == 0 {
            return Err(RagError::Configuration(
                "embedding dimension must be positive".to_string(),
            ));
        }
        let chunker = Chunker::new(options.chunk_size, options.chunk_overlap)?;
        let collection = Arc::new(VectorCollection::new(
            store,
            CollectionSpec {
                name: options.collection.clone(),
                dimension: options.dimension,
                distance: options.distance,
            },
        ));
        let batcher = EmbeddingBatcher::new(
            provider,
            options.batch_size,
            options.max_concurrent_batches,
        );
        let locks = Arc::new(FileLocks::new());

        Ok(Self {
            indexer: VectorIndexer::new(collection.clone(), batcher.clone(), chunker, locks.clone()),
            retriever: VectorRetriever::new(collection.clone(), batcher),
            deletion: DeletionOps::new(collection.clone(), locks),
            collection,
            default_query_limit: options.default_query_limit,
        })
    }

    pub fn collection(&self) -> &CollectionSpec {
        self.collection.spec()
    }

    pub fn backend(&self) -> &str {
        self.collection.store().backend()
    }

    pub fn default_query_limit(&self) -> usize {
        self.default_query_limit
    }

    /// Reach the store and make sure the collection exists.
    ///
    /// Unlike the four operations this returns its error: startup refuses to
    /// serve traffic without a verified store.
    pub async fn verify(&self) -> Result<(), RagError> {
        self.collection.store().health_check().await?;
        self.collection.ensure().await
    }

    pub async fn health(&self) -> Result<(), RagError> {
        self.collection.store().health_check().await
    }

    pub async fn index_file(&self, file: &FileDescriptor, raw_text: &str) -> RunStatus {
        match self.indexer.index_file(file, raw_text).await {
            Ok(outcome) => RunStatus::Completed(outcome),
            Err(err) => {
                report(
                    "index_file",
                    &format!("context {} file {}", file.context_id, file.file_id),
                    &err,
                );
                RunStatus::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }

    /// Returns whether the delete reached the store.
    pub async fn delete_file_vectors(&self, context_id: &str, file_id: &str) -> bool {
        match self.deletion.delete_file_vectors(context_id, file_id).await {
            Ok(()) => true,
            Err(err) => {
                report(
                    "delete_file_vectors",
                    &format!("context {context_id} file {file_id}"),
                    &err,
                );
                false
            }
        }
    }

    pub async fn delete_context_vectors(&self, context_id: &str) -> bool {
        match self.deletion.delete_context_vectors(context_id).await {
            Ok(()) => true,
            Err(err) => {
                report(
                    "delete_context_vectors",
                    &format!("context {context_id}"),
                    &err,
                );
                false
            }
        }
    }

    /// Ordered chunk texts; empty on any failure.
    pub async fn query_contexts(
        &self,
        context_ids: &[String],
        query_text: &str,
        limit: usize,
    ) -> Vec<String> {
        self.query_contexts_detailed(context_ids, query_text, limit)
            .await
            .into_iter()
            .map(|chunk| chunk.text)
            .collect()
    }

    pub async fn query_contexts_detailed(
        &self,
        context_ids: &[String],
        query_text: &str,
        limit: usize,
    ) -> Vec<RetrievedChunk> {
        match self
            .retriever
            .query_contexts(context_ids, query_text, limit)
            .await
        {
            Ok(chunks) => chunks,
            Err(err) => {
                report(
                    "query_contexts",
                    &format!("contexts [{}]", context_ids.join(", ")),
                    &err,
                );
                Vec::new()
            }
        }
    }

    /// Stored chunks for inspection. Not part of the degrading surface.
    pub async fn file_chunks(
        &self,
        context_id: &str,
        file_id: &str,
    ) -> Result<Vec<ChunkPayload>, RagError> {
        self.retriever.file_chunks(context_id, file_id).await
    }

    pub async fn count_context_vectors(&self, context_id: &str) -> Result<usize, RagError> {
        self.retriever.count_context_vectors(context_id).await
    }
}

fn report(operation: &str, target: &str, err: &RagError) {
    if err.is_degradable() {
        tracing::warn!("RAG {} failed for {}: {}", operation, target, err);
    } else {
        tracing::error!("RAG {} failed for {}: {}", operation, target, err);
    }
}
