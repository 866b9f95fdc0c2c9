//! In-memory doubles for the embedding provider and the vector store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::embedding::EmbeddingProvider;
use super::error::RagError;
use super::store::{
    ChunkPayload, CollectionSpec, PointFilter, ScoredPoint, VectorPoint, VectorStore,
};
use crate::vector_math;

/// Bag-of-words embedder: every distinct lowercase token gets its own axis.
pub struct FakeEmbedder {
    dimension: usize,
    vocabulary: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    fail_on_call: Option<usize>,
    drop_last: bool,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vocabulary: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            fail_on_call: None,
            drop_last: false,
        }
    }

    /// Fail the n-th call (1-based).
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Return one vector fewer than requested.
    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vocabulary = self.vocabulary.lock().unwrap();
        let mut vector = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let next = vocabulary.len();
            let axis = *vocabulary.entry(token.to_lowercase()).or_insert(next);
            vector[axis % self.dimension] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model(&self) -> &str {
        "fake-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_sizes.lock().unwrap().push(inputs.len());
        if self.fail_on_call == Some(call) {
            return Err(RagError::EmbeddingProvider("rate limited".to_string()));
        }

        let mut vectors: Vec<Vec<f32>> = inputs.iter().map(|text| self.vector_for(text)).collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }
}

/// Vector store kept in a `HashMap`, counting every call.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: Mutex<HashMap<String, (CollectionSpec, Vec<VectorPoint>)>>,
    calls: AtomicUsize,
    create_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    failing: Mutex<HashSet<&'static str>>,
    fail_upsert_on_call: Mutex<Option<usize>>,
    operations: Mutex<Vec<&'static str>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail ("upsert", "delete", "search", ...).
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn fail_upsert_on_call(&self, call: usize) {
        *self.fail_upsert_on_call.lock().unwrap() = Some(call);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Operation names in call order.
    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }

    pub fn points(&self, collection: &str) -> Vec<VectorPoint> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|(_, points)| points.clone())
            .unwrap_or_default()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.lock().unwrap().len()
    }

    fn record(&self, operation: &'static str) -> Result<(), RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.operations.lock().unwrap().push(operation);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(RagError::store(operation, "injected failure"));
        }
        Ok(())
    }

    fn missing(operation: &str, collection: &str) -> RagError {
        RagError::store(operation, format!("collection '{collection}' not found"))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), RagError> {
        self.record("health")
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionSpec>, RagError> {
        self.record("info")?;
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(name)
            .map(|(spec, _)| spec.clone()))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), RagError> {
        self.record("create")?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        if collections.contains_key(&spec.name) {
            return Err(RagError::store("create", "collection already exists"));
        }
        collections.insert(spec.name.clone(), (spec.clone(), Vec::new()));
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), RagError> {
        self.record("upsert")?;
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_upsert_on_call.lock().unwrap() == Some(call) {
            return Err(RagError::store("upsert", "injected failure"));
        }

        let mut collections = self.collections.lock().unwrap();
        let (spec, stored) = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing("upsert", collection))?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != spec.dimension) {
            return Err(RagError::store(
                "upsert",
                format!("wrong vector dimension {}", bad.vector.len()),
            ));
        }
        for point in points {
            stored.retain(|existing| existing.id != point.id);
            stored.push(point);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, filter: &PointFilter) -> Result<(), RagError> {
        self.record("delete")?;
        let mut collections = self.collections.lock().unwrap();
        let (_, stored) = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing("delete", collection))?;
        stored.retain(|point| !filter.matches(&point.payload));
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        self.record("search")?;
        let collections = self.collections.lock().unwrap();
        let (spec, stored) = collections
            .get(collection)
            .ok_or_else(|| Self::missing("search", collection))?;

        let mut scored: Vec<ScoredPoint> = stored
            .iter()
            .filter(|point| filter.matches(&point.payload))
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: spec.distance.score(vector, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| vector_math::descending(a.score, b.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &PointFilter,
    ) -> Result<Vec<ChunkPayload>, RagError> {
        self.record("scroll")?;
        Ok(self
            .points(collection)
            .into_iter()
            .filter(|point| filter.matches(&point.payload))
            .map(|point| point.payload)
            .collect())
    }

    async fn count(&self, collection: &str, filter: &PointFilter) -> Result<usize, RagError> {
        self.record("count")?;
        Ok(self
            .points(collection)
            .iter()
            .filter(|point| filter.matches(&point.payload))
            .count())
    }
}
