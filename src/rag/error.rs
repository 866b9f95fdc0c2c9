use serde::Serialize;
use thiserror::Error;

/// Failure categories raised inside the RAG subsystem.
///
/// "No usable text" is deliberately absent: it is an [`IndexOutcome`] rather
/// than an error.
///
/// [`IndexOutcome`]: super::indexer::IndexOutcome
#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding provider failed: {0}")]
    EmbeddingProvider(String),

    #[error("vector store failed during {operation}: {message}")]
    Store { operation: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RagErrorKind {
    EmbeddingProvider,
    Store,
    Configuration,
    InvalidInput,
}

impl RagError {
    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::EmbeddingProvider(err.to_string())
    }

    pub fn store<E: std::fmt::Display>(operation: &str, err: E) -> Self {
        RagError::Store {
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }

    /// Blank ids would widen a scoped filter, so they never reach the store.
    pub fn require_id(field: &str, value: &str) -> Result<(), RagError> {
        if value.trim().is_empty() {
            return Err(RagError::InvalidInput(format!("{field} must not be empty")));
        }
        Ok(())
    }

    pub fn kind(&self) -> RagErrorKind {
        match self {
            RagError::EmbeddingProvider(_) => RagErrorKind::EmbeddingProvider,
            RagError::Store { .. } => RagErrorKind::Store,
            RagError::Configuration(_) => RagErrorKind::Configuration,
            RagError::InvalidInput(_) => RagErrorKind::InvalidInput,
        }
    }

    /// Whether the boundary may swallow this error and degrade.
    ///
    /// Configuration errors are only allowed to escalate at startup.
    pub fn is_degradable(&self) -> bool {
        !matches!(self.kind(), RagErrorKind::Configuration)
    }
}
