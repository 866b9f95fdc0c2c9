#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use context_rag::rag::{
    EmbeddingProvider, RagError, RagOptions, RagService, SqliteVectorStore, VectorStore,
};

pub const DIMENSION: usize = 64;

/// Deterministic embedder: each distinct lowercase word gets its own axis.
#[derive(Default)]
pub struct VocabularyEmbedder {
    vocabulary: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl VocabularyEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vocabulary = self.vocabulary.lock().unwrap();
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let next = vocabulary.len();
            let axis = *vocabulary.entry(word.to_lowercase()).or_insert(next);
            vector[axis % DIMENSION] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    fn model(&self) -> &str {
        "vocabulary"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}

pub fn options(chunk_size: usize, chunk_overlap: usize) -> RagOptions {
    RagOptions {
        dimension: DIMENSION,
        chunk_size,
        chunk_overlap,
        ..RagOptions::default()
    }
}

pub async fn sqlite_store(dir: &tempfile::TempDir) -> Arc<dyn VectorStore> {
    Arc::new(
        SqliteVectorStore::with_path(dir.path().join("vectors.db"))
            .await
            .unwrap(),
    )
}

pub async fn sqlite_service(
    dir: &tempfile::TempDir,
    chunk_size: usize,
    chunk_overlap: usize,
) -> (Arc<VocabularyEmbedder>, RagService) {
    let embedder = Arc::new(VocabularyEmbedder::default());
    let service = RagService::new(
        sqlite_store(dir).await,
        embedder.clone(),
        options(chunk_size, chunk_overlap),
    )
    .unwrap();
    (embedder, service)
}
