//! Full-replace indexing of one file's vectors.

use std::pin::pin;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use uuid::Uuid;

use super::chunker::{normalize_text, Chunker};
use super::collection::VectorCollection;
use super::embedding::EmbeddingBatcher;
use super::error::RagError;
use super::locks::FileLocks;
use super::store::{ChunkPayload, PointFilter, VectorPoint};

/// Identity and metadata of the file being indexed.
#[derive(Debug, Clone, Serialize)]
pub struct FileDescriptor {
    pub context_id: String,
    pub file_id: String,
    pub file_name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// Nothing usable to index; not an error.
    Skipped { reason: String },
    Indexed { chunks: usize, batches: usize },
}

pub struct VectorIndexer {
    collection: Arc<VectorCollection>,
    batcher: EmbeddingBatcher,
    chunker: Chunker,
    locks: Arc<FileLocks>,
}

impl VectorIndexer {
    pub fn new(
        collection: Arc<VectorCollection>,
        batcher: EmbeddingBatcher,
        chunker: Chunker,
        locks: Arc<FileLocks>,
    ) -> Self {
        Self {
            collection,
            batcher,
            chunker,
            locks,
        }
    }

    /// Replace every vector of `file` with vectors built from `raw_text`.
    ///
    /// Steps run strictly in order: skip checks, chunk, ensure collection,
    /// delete the file's existing vectors, then embed and upsert batch by
    /// batch. A failure after the delete leaves the file partially indexed;
    /// the next run replaces it wholesale.
    pub async fn index_file(
        &self,
        file: &FileDescriptor,
        raw_text: &str,
    ) -> Result<IndexOutcome, RagError> {
        RagError::require_id("context_id", &file.context_id)?;
        RagError::require_id("file_id", &file.file_id)?;

        if raw_text.trim().is_empty() {
            tracing::info!(
                "Skipping indexing for file {} in context {}: no extractable text",
                file.file_id,
                file.context_id
            );
            return Ok(IndexOutcome::Skipped {
                reason: "no extractable text".to_string(),
            });
        }

        let normalized = normalize_text(raw_text);
        let texts: Vec<String> = self
            .chunker
            .chunks(&normalized)
            .map(|chunk| format!("[File: {}]\n{}", file.file_name, chunk))
            .collect();

        if texts.is_empty() {
            tracing::info!(
                "Skipping indexing for file {} in context {}: no chunks produced",
                file.file_id,
                file.context_id
            );
            return Ok(IndexOutcome::Skipped {
                reason: "no chunks produced".to_string(),
            });
        }

        let _guard = self.locks.lock(&file.context_id, &file.file_id).await;

        self.collection.ensure().await?;

        let store = self.collection.store();
        let collection = self.collection.name();

        store
            .delete(collection, &PointFilter::file(&file.context_id, &file.file_id))
            .await?;

        let total_batches = texts.len().div_ceil(self.batcher.batch_size());
        let mut batches = pin!(self.batcher.embed_batches(&texts));
        let mut chunk_index = 0usize;
        let mut batch_number = 0usize;

        while let Some(vectors) = batches.next().await {
            let vectors = vectors?;
            batch_number += 1;

            let points: Vec<VectorPoint> = vectors
                .into_iter()
                .map(|vector| {
                    let payload = ChunkPayload {
                        context_id: file.context_id.clone(),
                        file_id: file.file_id.clone(),
                        chunk_index,
                        text: texts[chunk_index].clone(),
                        source_file_name: file.file_name.clone(),
                        mime_type: file.mime_type.clone(),
                    };
                    chunk_index += 1;
                    VectorPoint {
                        id: Uuid::new_v4().to_string(),
                        vector,
                        payload,
                    }
                })
                .collect();

            store.upsert(collection, points).await?;

            tracing::info!(
                "Indexed batch {} of {} for file {} in context {} ({} of {} chunks)",
                batch_number,
                total_batches,
                file.file_id,
                file.context_id,
                chunk_index,
                texts.len()
            );
        }

        Ok(IndexOutcome::Indexed {
            chunks: chunk_index,
            batches: batch_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::{CollectionSpec, Distance, VectorStore};
    use crate::rag::testing::{FakeEmbedder, MemoryVectorStore};

    struct Fixture {
        store: Arc<MemoryVectorStore>,
        embedder: Arc<FakeEmbedder>,
        indexer: VectorIndexer,
    }

    fn fixture_with(embedder: FakeEmbedder, batch_size: usize, chunk_size: usize) -> Fixture {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(embedder);
        let collection = Arc::new(VectorCollection::new(
            store.clone(),
            CollectionSpec {
                name: "context_files".to_string(),
                dimension: 64,
                distance: Distance::Cosine,
            },
        ));
        let indexer = VectorIndexer::new(
            collection,
            EmbeddingBatcher::new(embedder.clone(), batch_size, 1),
            Chunker::new(chunk_size, chunk_size / 5).unwrap(),
            Arc::new(FileLocks::new()),
        );
        Fixture {
            store,
            embedder,
            indexer,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeEmbedder::new(64), 100, 10)
    }

    fn file(context_id: &str, file_id: &str) -> FileDescriptor {
        FileDescriptor {
            context_id: context_id.to_string(),
            file_id: file_id.to_string(),
            file_name: format!("{file_id}.txt"),
            mime_type: "text/plain".to_string(),
        }
    }

    fn indexes_for(store: &MemoryVectorStore, context_id: &str, file_id: &str) -> Vec<usize> {
        let mut indexes: Vec<usize> = store
            .points("context_files")
            .into_iter()
            .filter(|p| p.payload.context_id == context_id && p.payload.file_id == file_id)
            .map(|p| p.payload.chunk_index)
            .collect();
        indexes.sort_unstable();
        indexes
    }

    #[tokio::test]
    async fn blank_text_is_skipped_without_calls() {
        let fx = fixture();

        let outcome = fx.indexer.index_file(&file("c1", "f1"), "  \n\t ").await.unwrap();

        assert!(matches!(outcome, IndexOutcome::Skipped { .. }));
        assert_eq!(fx.store.calls(), 0);
        assert_eq!(fx.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn chunks_are_prefixed_and_contiguous() {
        let fx = fixture();

        let outcome = fx
            .indexer
            .index_file(&file("c1", "f1"), "Alpha. Beta. Gamma.")
            .await
            .unwrap();

        assert_eq!(outcome, IndexOutcome::Indexed { chunks: 3, batches: 1 });
        assert_eq!(indexes_for(&fx.store, "c1", "f1"), vec![0, 1, 2]);
        let points = fx.store.points("context_files");
        assert!(points
            .iter()
            .all(|p| p.payload.text.starts_with("[File: f1.txt]\n")));
        let first = points.iter().find(|p| p.payload.chunk_index == 0).unwrap();
        assert!(first.payload.text.contains("Alpha"));
    }

    #[tokio::test]
    async fn chunk_index_is_global_across_batches() {
        let fx = fixture_with(FakeEmbedder::new(64), 2, 10);
        let text = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJ";

        let outcome = fx.indexer.index_file(&file("c1", "f1"), text).await.unwrap();

        let IndexOutcome::Indexed { chunks, batches } = outcome else {
            panic!("expected indexed outcome");
        };
        assert_eq!(batches, chunks.div_ceil(2));
        assert_eq!(indexes_for(&fx.store, "c1", "f1"), (0..chunks).collect::<Vec<_>>());
        assert!(fx.embedder.batch_sizes().iter().all(|size| *size <= 2));
    }

    #[tokio::test]
    async fn delete_runs_before_any_upsert() {
        let fx = fixture();

        fx.indexer
            .index_file(&file("c1", "f1"), "Alpha. Beta. Gamma.")
            .await
            .unwrap();

        let ops: Vec<&str> = fx
            .store
            .operations()
            .into_iter()
            .filter(|op| *op == "delete" || *op == "upsert")
            .collect();
        assert_eq!(ops.first(), Some(&"delete"));
    }

    #[tokio::test]
    async fn reindex_replaces_previous_vectors() {
        let fx = fixture();
        let long = "one two three four five six seven eight nine ten eleven twelve";

        fx.indexer.index_file(&file("c1", "f1"), long).await.unwrap();
        let before = indexes_for(&fx.store, "c1", "f1").len();
        fx.indexer.index_file(&file("c1", "f1"), "short text").await.unwrap();

        let after = indexes_for(&fx.store, "c1", "f1");
        assert!(before > after.len());
        assert_eq!(after, (0..after.len()).collect::<Vec<_>>());
        assert!(fx
            .store
            .points("context_files")
            .iter()
            .all(|p| !p.payload.text.contains("twelve")));
    }

    #[tokio::test]
    async fn reindex_leaves_other_files_alone() {
        let fx = fixture();

        fx.indexer.index_file(&file("c1", "f1"), "first file").await.unwrap();
        fx.indexer.index_file(&file("c1", "f2"), "second file").await.unwrap();
        fx.indexer.index_file(&file("c1", "f1"), "first again").await.unwrap();

        assert!(!indexes_for(&fx.store, "c1", "f2").is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_aborts_without_rollback() {
        let fx = fixture_with(FakeEmbedder::new(64).failing_on_call(2), 1, 10);

        let result = fx
            .indexer
            .index_file(&file("c1", "f1"), "Alpha. Beta. Gamma.")
            .await;

        assert!(matches!(result, Err(RagError::EmbeddingProvider(_))));
        assert_eq!(indexes_for(&fx.store, "c1", "f1"), vec![0]);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_error() {
        let fx = fixture();
        fx.store
            .create_collection(&CollectionSpec {
                name: "context_files".to_string(),
                dimension: 64,
                distance: Distance::Cosine,
            })
            .await
            .unwrap();
        fx.store.fail_upsert_on_call(1);

        let result = fx.indexer.index_file(&file("c1", "f1"), "some text").await;

        assert!(matches!(result, Err(RagError::Store { .. })));
    }

    #[tokio::test]
    async fn concurrent_runs_for_same_file_do_not_mix() {
        let fx = Arc::new(fixture_with(FakeEmbedder::new(64), 1, 10));

        let a = {
            let fx = fx.clone();
            tokio::spawn(async move {
                fx.indexer
                    .index_file(&file("c1", "f1"), "aaaa bbbb cccc dddd eeee ffff")
                    .await
            })
        };
        let b = {
            let fx = fx.clone();
            tokio::spawn(async move {
                fx.indexer
                    .index_file(&file("c1", "f1"), "gggg hhhh iiii jjjj")
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let indexes = indexes_for(&fx.store, "c1", "f1");
        assert_eq!(indexes, (0..indexes.len()).collect::<Vec<_>>());
    }
}
