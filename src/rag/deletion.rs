//! Scoped removal of vectors by file or by context.

use std::sync::Arc;

use super::collection::VectorCollection;
use super::error::RagError;
use super::locks::FileLocks;
use super::store::PointFilter;

pub struct DeletionOps {
    collection: Arc<VectorCollection>,
    locks: Arc<FileLocks>,
}

impl DeletionOps {
    pub fn new(collection: Arc<VectorCollection>, locks: Arc<FileLocks>) -> Self {
        Self { collection, locks }
    }

    /// Remove the vectors of exactly one `(context_id, file_id)` pair.
    /// Idempotent.
    pub async fn delete_file_vectors(
        &self,
        context_id: &str,
        file_id: &str,
    ) -> Result<(), RagError> {
        RagError::require_id("context_id", context_id)?;
        RagError::require_id("file_id", file_id)?;

        let _guard = self.locks.lock(context_id, file_id).await;
        self.collection.ensure().await?;
        self.collection
            .store()
            .delete(self.collection.name(), &PointFilter::file(context_id, file_id))
            .await?;
        tracing::info!("Deleted vectors for file {} in context {}", file_id, context_id);
        Ok(())
    }

    /// Remove every vector tagged with `context_id`, whatever its file.
    pub async fn delete_context_vectors(&self, context_id: &str) -> Result<(), RagError> {
        RagError::require_id("context_id", context_id)?;

        self.collection.ensure().await?;
        self.collection
            .store()
            .delete(self.collection.name(), &PointFilter::context(context_id))
            .await?;
        tracing::info!("Deleted all vectors for context {}", context_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::chunker::Chunker;
    use crate::rag::embedding::EmbeddingBatcher;
    use crate::rag::indexer::{FileDescriptor, VectorIndexer};
    use crate::rag::store::{CollectionSpec, Distance};
    use crate::rag::testing::{FakeEmbedder, MemoryVectorStore};

    struct Fixture {
        store: Arc<MemoryVectorStore>,
        indexer: VectorIndexer,
        deletion: DeletionOps,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryVectorStore::new());
        let collection = Arc::new(VectorCollection::new(
            store.clone(),
            CollectionSpec {
                name: "context_files".to_string(),
                dimension: 32,
                distance: Distance::Cosine,
            },
        ));
        let locks = Arc::new(FileLocks::new());
        Fixture {
            indexer: VectorIndexer::new(
                collection.clone(),
                EmbeddingBatcher::new(Arc::new(FakeEmbedder::new(32)), 100, 1),
                Chunker::new(20, 4).unwrap(),
                locks.clone(),
            ),
            deletion: DeletionOps::new(collection, locks),
            store,
        }
    }

    async fn index(fx: &Fixture, context_id: &str, file_id: &str, text: &str) {
        let file = FileDescriptor {
            context_id: context_id.to_string(),
            file_id: file_id.to_string(),
            file_name: format!("{file_id}.md"),
            mime_type: "text/markdown".to_string(),
        };
        fx.indexer.index_file(&file, text).await.unwrap();
    }

    fn files_in(store: &MemoryVectorStore, context_id: &str) -> Vec<String> {
        let mut files: Vec<String> = store
            .points("context_files")
            .into_iter()
            .filter(|p| p.payload.context_id == context_id)
            .map(|p| p.payload.file_id)
            .collect();
        files.sort();
        files.dedup();
        files
    }

    #[tokio::test]
    async fn delete_file_keeps_sibling_files() {
        let fx = fixture();
        index(&fx, "c1", "f1", "first file body").await;
        index(&fx, "c1", "f2", "second file body").await;

        fx.deletion.delete_file_vectors("c1", "f1").await.unwrap();

        assert_eq!(files_in(&fx.store, "c1"), vec!["f2".to_string()]);
    }

    #[tokio::test]
    async fn delete_file_is_idempotent() {
        let fx = fixture();

        fx.deletion.delete_file_vectors("c1", "missing").await.unwrap();
        fx.deletion.delete_file_vectors("c1", "missing").await.unwrap();

        assert_eq!(fx.store.collection_count(), 1);
    }

    #[tokio::test]
    async fn delete_context_removes_all_files_and_only_that_context() {
        let fx = fixture();
        index(&fx, "c1", "f1", "first file body").await;
        index(&fx, "c1", "f2", "second file body").await;
        index(&fx, "c2", "f3", "other context").await;

        fx.deletion.delete_context_vectors("c1").await.unwrap();

        assert!(files_in(&fx.store, "c1").is_empty());
        assert_eq!(files_in(&fx.store, "c2"), vec!["f3".to_string()]);
    }

    #[tokio::test]
    async fn blank_ids_are_rejected_before_touching_the_store() {
        let fx = fixture();
        index(&fx, "c1", "f1", "first file body").await;

        let err = fx.deletion.delete_file_vectors("c1", " ").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        let err = fx.deletion.delete_context_vectors("").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));

        assert_eq!(files_in(&fx.store, "c1"), vec!["f1".to_string()]);
    }
}
