use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::security::ServiceKey;
use crate::rag::{
    is_sqlite_url, EmbeddingProvider, IndexScheduler, OpenAiEmbeddingClient, QdrantStore,
    RagError, RagService, SqliteVectorStore, VectorStore,
};

pub mod error;

use error::InitializationError;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub service_key: Option<ServiceKey>,
    pub rag: Arc<RagService>,
    pub scheduler: IndexScheduler,
}

impl AppState {
    /// Loads configuration, builds the clients and verifies the vector store.
    ///
    /// Fails instead of starting degraded: the service never accepts traffic
    /// without a reachable store and an ensured collection.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let settings = ConfigService::new(paths).load_settings()?;

        let store = build_vector_store(&settings)
            .await
            .map_err(InitializationError::VectorStore)?;
        let provider = build_embedding_provider(&settings).map_err(InitializationError::Embedding)?;

        Self::from_parts(settings, store, provider).await
    }

    /// Assemble state around already-built clients.
    pub async fn from_parts(
        settings: Settings,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let rag = Arc::new(
            RagService::new(store, provider, settings.rag_options())
                .map_err(InitializationError::Rag)?,
        );
        rag.verify()
            .await
            .map_err(InitializationError::Verification)?;
        tracing::info!(
            "Vector store '{}' ready with collection '{}' (dimension {}, {})",
            rag.backend(),
            rag.collection().name,
            rag.collection().dimension,
            rag.collection().distance
        );

        let scheduler = IndexScheduler::new(rag.clone(), settings.indexing.max_concurrent_runs);
        let service_key = ServiceKey::from_config(settings.server.api_key.as_deref());
        if service_key.is_none() {
            tracing::warn!("No service API key configured; the API accepts unauthenticated calls");
        }

        Ok(Arc::new(AppState {
            settings: Arc::new(settings),
            service_key,
            rag,
            scheduler,
        }))
    }
}

async fn build_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>, RagError> {
    let url = settings
        .vector_store_url()
        .map_err(|err| RagError::Configuration(err.to_string()))?;

    if is_sqlite_url(url) {
        let store = SqliteVectorStore::from_url(url).await?;
        tracing::info!("Using embedded vector store at {}", store.db_path().display());
        return Ok(Arc::new(store));
    }

    let store = QdrantStore::new(
        url,
        settings.vector_store.api_key.clone(),
        settings.vector_store_timeout(),
    )?;
    tracing::info!("Using Qdrant vector store at {}", url);
    Ok(Arc::new(store))
}

fn build_embedding_provider(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    let embedding = &settings.embedding;
    if embedding.api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
        tracing::warn!(
            "No embedding API key configured; requests to {} are sent unauthenticated",
            embedding.base_url
        );
    }
    let client = OpenAiEmbeddingClient::new(
        &embedding.base_url,
        embedding.api_key.clone(),
        &embedding.model,
        embedding.dimension,
        settings.embedding_timeout(),
    )?;
    Ok(Arc::new(client))
}
