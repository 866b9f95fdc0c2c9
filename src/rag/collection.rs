//! Lazy lifecycle of the shared vector collection.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::error::RagError;
use super::store::{CollectionSpec, VectorStore};

/// One named collection whose dimension and metric are fixed at creation.
///
/// `ensure` is idempotent and cheap after the first success, so every
/// operation calls it first.
pub struct VectorCollection {
    store: Arc<dyn VectorStore>,
    spec: CollectionSpec,
    ensured: OnceCell<()>,
}

impl VectorCollection {
    pub fn new(store: Arc<dyn VectorStore>, spec: CollectionSpec) -> Self {
        Self {
            store,
            spec,
            ensured: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Create the collection with the configured parameters if it is missing.
    pub async fn ensure(&self) -> Result<(), RagError> {
        self.ensured
            .get_or_try_init(|| ensure_collection(self.store.as_ref(), &self.spec))
            .await
            .map(|_| ())
    }
}

/// Create `spec` unless a collection with that name already exists.
///
/// An existing collection is never altered, even when its dimension or
/// metric differ from `spec`; the mismatch is only logged at debug level.
pub async fn ensure_collection(
    store: &dyn VectorStore,
    spec: &CollectionSpec,
) -> Result<(), RagError> {
    if let Some(existing) = store.collection_info(&spec.name).await? {
        log_mismatch(&existing, spec);
        return Ok(());
    }

    match store.create_collection(spec).await {
        Ok(()) => {
            tracing::info!(
                "Created vector collection '{}' (dimension {}, {})",
                spec.name,
                spec.dimension,
                spec.distance
            );
            Ok(())
        }
        Err(create_err) => {
            // Another process may have created it between our check and create.
            match store.collection_info(&spec.name).await? {
                Some(existing) => {
                    log_mismatch(&existing, spec);
                    Ok(())
                }
                None => Err(create_err),
            }
        }
    }
}

fn log_mismatch(existing: &CollectionSpec, requested: &CollectionSpec) {
    if existing.dimension != requested.dimension || existing.distance != requested.distance {
        tracing::debug!(
            "Collection '{}' exists with dimension {} ({}); requested {} ({}) ignored",
            existing.name,
            existing.dimension,
            existing.distance,
            requested.dimension,
            requested.distance
        );
    }
}
