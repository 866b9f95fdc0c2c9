//! Typed view of the merged configuration document.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;
use crate::rag::{Distance, RagOptions, DEFAULT_EMBEDDING_BATCH_SIZE};

pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub chunking: ChunkingSettings,
    pub indexing: IndexingSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// When set, every `/api` request must carry it in `x-api-key`.
    pub api_key: Option<String>,
    /// Largest accepted request body; extracted file text arrives in one request.
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub request_timeout_secs: Option<u64>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            max_concurrent_batches: 1,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// `http(s)://` selects Qdrant, `sqlite://<path>` the embedded store.
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub collection: String,
    pub distance: Distance,
    pub request_timeout_secs: Option<u64>,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection: "context_files".to_string(),
            distance: Distance::Cosine,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 160,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    pub max_concurrent_runs: usize,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

impl Settings {
    pub fn rag_options(&self) -> RagOptions {
        RagOptions {
            collection: self.vector_store.collection.clone(),
            dimension: self.embedding.dimension,
            distance: self.vector_store.distance,
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            batch_size: self.embedding.batch_size,
            max_concurrent_batches: self.embedding.max_concurrent_batches,
            default_query_limit: self.retrieval.default_limit,
        }
    }

    pub fn vector_store_url(&self) -> Result<&str, ConfigError> {
        self.vector_store
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::invalid("vector_store.url", "value is required"))
    }

    pub fn embedding_timeout(&self) -> Option<Duration> {
        self.embedding.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn vector_store_timeout(&self) -> Option<Duration> {
        self.vector_store.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_setup() {
        let settings = Settings::default();
        let options = settings.rag_options();

        assert_eq!(options.collection, "context_files");
        assert_eq!(options.dimension, 1536);
        assert_eq!(options.chunk_size, 800);
        assert_eq!(options.chunk_overlap, 160);
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.max_concurrent_batches, 1);
        assert_eq!(settings.indexing.max_concurrent_runs, 4);
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "vector_store": { "url": "http://qdrant:6334", "distance": "dot" },
            "chunking": { "chunk_size": 400 }
        }))
        .unwrap();

        assert_eq!(settings.vector_store_url().unwrap(), "http://qdrant:6334");
        assert_eq!(settings.vector_store.distance, Distance::Dot);
        assert_eq!(settings.vector_store.collection, "context_files");
        assert_eq!(settings.chunking.chunk_size, 400);
        assert_eq!(settings.chunking.chunk_overlap, 160);
    }

    #[test]
    fn missing_vector_store_url_is_reported() {
        let err = Settings::default().vector_store_url().unwrap_err();
        assert!(err.to_string().contains("vector_store.url"));
    }
}
