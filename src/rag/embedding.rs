//! Embedding provider client and batcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::error::RagError;

/// Maximum number of inputs sent to the provider in one call.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 100;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. "text-embedding-3-small").
    fn model(&self) -> &str;

    /// Dimension of every returned vector.
    fn dimension(&self) -> usize;

    /// Embed `inputs`, returning one vector per input in the same order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Client for OpenAI-compatible `/v1/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    client: Client,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        dimension: usize,
        request_timeout: Option<Duration>,
    ) -> Result<Self, RagError> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| RagError::Configuration(format!("embedding client: {err}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: model.to_string(),
            dimension,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(RagError::embedding)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingProvider(format!(
                "embedding request returned {status}: {text}"
            )));
        }

        let payload: EmbeddingResponse = res.json().await.map_err(RagError::embedding)?;

        let mut items = payload.data;
        items.sort_by_key(|item| item.index.unwrap_or(usize::MAX));

        Ok(items.into_iter().map(|item| item.embedding).collect())
    }
}

/// Splits inputs into bounded batches and embeds them through a provider.
#[derive(Clone)]
pub struct EmbeddingBatcher {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrent_batches: usize,
}

impl EmbeddingBatcher {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        max_concurrent_batches: usize,
    ) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            max_concurrent_batches: max_concurrent_batches.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed a single batch and check the provider kept its contract.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.provider.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingProvider(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        let expected = self.provider.dimension();
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != expected) {
            return Err(RagError::EmbeddingProvider(format!(
                "dimension mismatch: got {} expected {}",
                bad.len(),
                expected
            )));
        }

        Ok(vectors)
    }

    /// Embed one query string.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingProvider("empty embedding response".to_string()))
    }

    /// Embed every input, batch by batch, preserving order.
    ///
    /// Batches run one at a time unless `max_concurrent_batches` allows more;
    /// results always come back in input order.
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let batches: Vec<Vec<Vec<f32>>> = self
            .embed_batches(texts)
            .try_collect()
            .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    /// Ordered stream of per-batch embeddings.
    ///
    /// The stream yields exactly `ceil(len / batch_size)` items; a failed
    /// batch ends the useful part of the run for the caller.
    pub fn embed_batches<'a>(
        &'a self,
        texts: &'a [String],
    ) -> impl futures_util::Stream<Item = Result<Vec<Vec<f32>>, RagError>> + Send + 'a {
        stream::iter(texts.chunks(self.batch_size))
            .map(move |batch| self.embed_batch(batch))
            .buffered(self.max_concurrent_batches)
    }
}
