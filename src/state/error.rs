use thiserror::Error;

use crate::core::errors::ConfigError;
use crate::rag::RagError;

/// Startup failures. Any of these stops the process before it binds.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to build embedding client: {0}")]
    Embedding(#[source] RagError),

    #[error("Failed to connect vector store: {0}")]
    VectorStore(#[source] RagError),

    #[error("Failed to initialize RAG service: {0}")]
    Rag(#[source] RagError),

    #[error("Vector store verification failed: {0}")]
    Verification(#[source] RagError),
}
