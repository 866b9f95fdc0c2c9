//! Chunking, embedding, indexing and retrieval of context files.
//!
//! [`RagService`] is the boundary the rest of the backend talks to;
//! everything below it returns [`RagError`] and leaves the degrade
//! decision to the service.

mod chunker;
mod collection;
mod deletion;
mod embedding;
mod error;
mod indexer;
mod locks;
mod qdrant;
mod retriever;
mod scheduler;
mod service;
mod sqlite;
mod store;

#[cfg(test)]
mod testing;

pub use chunker::{normalize_text, Chunker, Chunks};
pub use collection::{ensure_collection, VectorCollection};
pub use deletion::DeletionOps;
pub use embedding::{
    EmbeddingBatcher, EmbeddingProvider, OpenAiEmbeddingClient, DEFAULT_EMBEDDING_BATCH_SIZE,
};
pub use error::{RagError, RagErrorKind};
pub use indexer::{FileDescriptor, IndexOutcome, VectorIndexer};
pub use locks::FileLocks;
pub use qdrant::QdrantStore;
pub use retriever::{strip_file_marker, RetrievedChunk, VectorRetriever};
pub use scheduler::{IndexReport, IndexScheduler, IndexTicket};
pub use service::{RagOptions, RagService, RunStatus};
pub use sqlite::{is_sqlite_url, SqliteVectorStore};
pub use store::{
    ChunkPayload, CollectionSpec, Distance, PointFilter, ScoredPoint, VectorPoint, VectorStore,
};
