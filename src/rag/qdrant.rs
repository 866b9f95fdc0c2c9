//! Qdrant backend over the `qdrant-client` gRPC API.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPoints, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePoints, DeletePointsBuilder, FieldType, Filter,
    PointId, PointStruct, Query, QueryPoints, QueryPointsBuilder, ScrollPoints,
    ScrollPointsBuilder, UpsertPoints, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};

use super::error::RagError;
use super::store::{
    ChunkPayload, CollectionSpec, Distance, PointFilter, ScoredPoint, VectorPoint, VectorStore,
};

/// Payload fields that get a keyword index at collection creation.
const INDEXED_PAYLOAD_FIELDS: [&str; 2] = ["context_id", "file_id"];

const SCROLL_PAGE_SIZE: u32 = 256;

pub struct QdrantStore {
    client: Qdrant,
    distances: Mutex<HashMap<String, Distance>>,
}

impl QdrantStore {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, RagError> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(RagError::Configuration(
                "vector store url is empty".to_string(),
            ));
        }

        let mut builder = Qdrant::from_url(url)
            .api_key(api_key.filter(|key| !key.trim().is_empty()))
            .skip_compatibility_check();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| RagError::Configuration(format!("qdrant client: {err}")))?;

        Ok(Self {
            client,
            distances: Mutex::new(HashMap::new()),
        })
    }

    fn remember(&self, name: &str, distance: Distance) {
        self.distances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), distance);
    }

    fn distance_of(&self, name: &str) -> Option<Distance> {
        self.distances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
    }
}

/// Qdrant filter for `filter`: any-of on `context_id`, exact `file_id`.
pub fn qdrant_filter(filter: &PointFilter) -> Filter {
    let mut must = vec![Condition::matches("context_id", filter.context_ids.clone())];
    if let Some(file_id) = &filter.file_id {
        must.push(Condition::matches("file_id", file_id.clone()));
    }
    Filter::must(must)
}

fn to_qdrant_distance(distance: Distance) -> qdrant_client::qdrant::Distance {
    match distance {
        Distance::Cosine => qdrant_client::qdrant::Distance::Cosine,
        Distance::Dot => qdrant_client::qdrant::Distance::Dot,
        Distance::Euclid => qdrant_client::qdrant::Distance::Euclid,
    }
}

fn from_qdrant_distance(distance: qdrant_client::qdrant::Distance) -> Distance {
    match distance {
        qdrant_client::qdrant::Distance::Dot => Distance::Dot,
        qdrant_client::qdrant::Distance::Euclid => Distance::Euclid,
        _ => Distance::Cosine,
    }
}

/// Qdrant reports raw distance for Euclid; flip it so higher is better.
fn similarity(distance: Option<Distance>, raw: f32) -> f32 {
    match distance {
        Some(Distance::Euclid) => -raw,
        _ => raw,
    }
}

fn upsert_request(collection: &str, points: Vec<VectorPoint>) -> Result<UpsertPoints, RagError> {
    let points = points
        .into_iter()
        .map(|point| -> Result<PointStruct, RagError> {
            let payload = serde_json::to_value(&point.payload)
                .map_err(|err| RagError::store("upsert", err))?;
            let payload =
                Payload::try_from(payload).map_err(|err| RagError::store("upsert", err))?;
            Ok(PointStruct::new(point.id, point.vector, payload))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(UpsertPointsBuilder::new(collection, points).wait(true).into())
}

fn delete_request(collection: &str, filter: &PointFilter) -> DeletePoints {
    DeletePointsBuilder::new(collection)
        .points(qdrant_filter(filter))
        .wait(true)
        .into()
}

fn search_request(
    collection: &str,
    vector: &[f32],
    filter: &PointFilter,
    limit: usize,
) -> QueryPoints {
    QueryPointsBuilder::new(collection)
        .query(Query::new_nearest(vector.to_vec()))
        .filter(qdrant_filter(filter))
        .with_payload(true)
        .limit(limit as u64)
        .into()
}

fn scroll_request(
    collection: &str,
    filter: &PointFilter,
    offset: Option<PointId>,
) -> ScrollPoints {
    let mut builder = ScrollPointsBuilder::new(collection)
        .filter(qdrant_filter(filter))
        .limit(SCROLL_PAGE_SIZE)
        .with_payload(true)
        .with_vectors(false);
    if let Some(offset) = offset {
        builder = builder.offset(offset);
    }
    builder.into()
}

fn count_request(collection: &str, filter: &PointFilter) -> CountPoints {
    CountPointsBuilder::new(collection)
        .filter(qdrant_filter(filter))
        .exact(true)
        .into()
}

fn point_id(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn string_field(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(text) => Some(text.clone()),
        _ => None,
    }
}

/// Rebuilds a chunk payload; points written by something else yield `None`.
fn chunk_payload(payload: &HashMap<String, QdrantValue>) -> Option<ChunkPayload> {
    let chunk_index = match payload.get("chunk_index")?.kind.as_ref()? {
        Kind::IntegerValue(index) => usize::try_from(*index).ok()?,
        Kind::DoubleValue(index) if *index >= 0.0 => *index as usize,
        _ => return None,
    };
    Some(ChunkPayload {
        context_id: string_field(payload, "context_id")?,
        file_id: string_field(payload, "file_id")?,
        chunk_index,
        text: string_field(payload, "text")?,
        source_file_name: string_field(payload, "source_file_name").unwrap_or_default(),
        mime_type: string_field(payload, "mime_type").unwrap_or_default(),
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> &str {
        "qdrant"
    }

    async fn health_check(&self) -> Result<(), RagError> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|err| RagError::store("health", err))
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionSpec>, RagError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|err| RagError::store("info", err))?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|err| RagError::store("info", err))?;
        let params = info
            .result
            .and_then(|info| info.config)
            .and_then(|config| config.params)
            .and_then(|params| params.vectors_config)
            .and_then(|vectors| vectors.config);
        let params = match params {
            Some(qdrant_client::qdrant::vectors_config::Config::Params(params)) => params,
            _ => {
                return Err(RagError::store(
                    "info",
                    format!("collection '{name}' has no single unnamed vector"),
                ))
            }
        };

        let distance = from_qdrant_distance(params.distance());
        self.remember(name, distance);
        Ok(Some(CollectionSpec {
            name: name.to_string(),
            dimension: params.size as usize,
            distance,
        }))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), RagError> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(spec.name.clone()).vectors_config(
                    VectorParamsBuilder::new(
                        spec.dimension as u64,
                        to_qdrant_distance(spec.distance),
                    ),
                ),
            )
            .await
            .map_err(|err| RagError::store("create", err))?;
        self.remember(&spec.name, spec.distance);

        for field in INDEXED_PAYLOAD_FIELDS {
            if let Err(err) = self
                .client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(
                        spec.name.clone(),
                        field,
                        FieldType::Keyword,
                    )
                    .wait(true),
                )
                .await
            {
                tracing::warn!("Failed to index payload field '{}': {}", field, err);
            }
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), RagError> {
        if points.is_empty() {
            return Ok(());
        }
        self.client
            .upsert_points(upsert_request(collection, points)?)
            .await
            .map(|_| ())
            .map_err(|err| RagError::store("upsert", err))
    }

    async fn delete(&self, collection: &str, filter: &PointFilter) -> Result<(), RagError> {
        if filter.context_ids.is_empty() {
            return Ok(());
        }
        self.client
            .delete_points(delete_request(collection, filter))
            .await
            .map(|_| ())
            .map_err(|err| RagError::store("delete", err))
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        if filter.context_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .query(search_request(collection, vector, filter, limit))
            .await
            .map_err(|err| RagError::store("search", err))?;

        let distance = self.distance_of(collection);
        Ok(response
            .result
            .into_iter()
            .filter_map(|hit| {
                let payload = chunk_payload(&hit.payload)?;
                Some(ScoredPoint {
                    id: point_id(hit.id),
                    score: similarity(distance, hit.score),
                    payload,
                })
            })
            .collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &PointFilter,
    ) -> Result<Vec<ChunkPayload>, RagError> {
        if filter.context_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut payloads = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let page = self
                .client
                .scroll(scroll_request(collection, filter, offset.take()))
                .await
                .map_err(|err| RagError::store("scroll", err))?;
            payloads.extend(
                page.result
                    .iter()
                    .filter_map(|record| chunk_payload(&record.payload)),
            );
            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(payloads)
    }

    async fn count(&self, collection: &str, filter: &PointFilter) -> Result<usize, RagError> {
        if filter.context_ids.is_empty() {
            return Ok(0);
        }
        let response = self
            .client
            .count(count_request(collection, filter))
            .await
            .map_err(|err| RagError::store("count", err))?;
        Ok(response.result.map_or(0, |result| result.count as usize))
    }
}
