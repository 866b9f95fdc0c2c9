//! Context-scoped retrieval-augmented generation: chunking, embedding,
//! indexing and similarity search over a project's uploaded files.

pub mod core;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;
