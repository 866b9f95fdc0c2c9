//! SQLite-backed vector store.
//!
//! Embedded backend for single-node deployments and tests. Payload fields
//! live in plain columns so filters run in SQL; similarity is brute force
//! over the filtered rows.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::error::RagError;
use super::store::{
    ChunkPayload, CollectionSpec, Distance, PointFilter, ScoredPoint, VectorPoint, VectorStore,
};
use crate::vector_math;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

/// Path part of a `sqlite:` URL. The scheme matches case-insensitively.
fn sqlite_path(url: &str) -> Option<&str> {
    let (scheme, rest) = url.trim().split_once(':')?;
    if !scheme.eq_ignore_ascii_case("sqlite") {
        return None;
    }
    Some(rest.strip_prefix("//").unwrap_or(rest))
}

pub fn is_sqlite_url(url: &str) -> bool {
    sqlite_path(url).is_some()
}

impl SqliteVectorStore {
    /// Open the database named by a `sqlite://<path>` URL.
    pub async fn from_url(url: &str) -> Result<Self, RagError> {
        let path = sqlite_path(url)
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| {
                RagError::Configuration(format!("'{url}' is not a sqlite:// url with a path"))
            })?;
        Self::with_path(PathBuf::from(path)).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                RagError::Configuration(format!(
                    "cannot create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|err| RagError::store("connect", err))?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                distance TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|err| RagError::store("schema", err))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_points (
                collection TEXT NOT NULL REFERENCES vector_collections(name) ON DELETE CASCADE,
                point_id TEXT NOT NULL,
                context_id TEXT NOT NULL,
                file_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                source_file_name TEXT NOT NULL DEFAULT '',
                mime_type TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (collection, point_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|err| RagError::store("schema", err))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_vector_points_scope
             ON vector_points(collection, context_id, file_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|err| RagError::store("schema", err))?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_payload(row: &SqliteRow) -> ChunkPayload {
        let chunk_index: i64 = row.get("chunk_index");
        ChunkPayload {
            context_id: row.get("context_id"),
            file_id: row.get("file_id"),
            chunk_index: chunk_index.max(0) as usize,
            text: row.get("text"),
            source_file_name: row.get("source_file_name"),
            mime_type: row.get("mime_type"),
        }
    }

    async fn spec_of(&self, operation: &str, name: &str) -> Result<CollectionSpec, RagError> {
        self.collection_info(name)
            .await?
            .ok_or_else(|| RagError::store(operation, format!("collection '{name}' not found")))
    }
}

/// Append `collection = ? AND context_id IN (...) [AND file_id = ?]`.
fn push_scope(builder: &mut QueryBuilder<'_, Sqlite>, collection: &str, filter: &PointFilter) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection.to_string());
    builder.push(" AND context_id IN (");
    let mut ids = builder.separated(", ");
    for id in &filter.context_ids {
        ids.push_bind(id.clone());
    }
    ids.push_unseparated(")");
    if let Some(file_id) = &filter.file_id {
        builder.push(" AND file_id = ");
        builder.push_bind(file_id.clone());
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<(), RagError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| RagError::store("health", err))?;
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionSpec>, RagError> {
        let row = sqlx::query("SELECT dimension, distance FROM vector_collections WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| RagError::store("info", err))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let dimension: i64 = row.get("dimension");
        let distance: String = row.get("distance");
        Ok(Some(CollectionSpec {
            name: name.to_string(),
            dimension: dimension.max(0) as usize,
            distance: distance.parse::<Distance>()?,
        }))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), RagError> {
        sqlx::query("INSERT INTO vector_collections (name, dimension, distance) VALUES (?1, ?2, ?3)")
            .bind(&spec.name)
            .bind(spec.dimension as i64)
            .bind(spec.distance.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| RagError::store("create", err))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), RagError> {
        if points.is_empty() {
            return Ok(());
        }
        let spec = self.spec_of("upsert", collection).await?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != spec.dimension) {
            return Err(RagError::store(
                "upsert",
                format!(
                    "vector dimension {} does not match collection dimension {}",
                    bad.vector.len(),
                    spec.dimension
                ),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| RagError::store("upsert", err))?;

        for point in &points {
            sqlx::query(
                "INSERT OR REPLACE INTO vector_points
                    (collection, point_id, context_id, file_id, chunk_index, text, source_file_name, mime_type, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(collection)
            .bind(&point.id)
            .bind(&point.payload.context_id)
            .bind(&point.payload.file_id)
            .bind(point.payload.chunk_index as i64)
            .bind(&point.payload.text)
            .bind(&point.payload.source_file_name)
            .bind(&point.payload.mime_type)
            .bind(Self::serialize_embedding(&point.vector))
            .execute(&mut *tx)
            .await
            .map_err(|err| RagError::store("upsert", err))?;
        }

        tx.commit()
            .await
            .map_err(|err| RagError::store("upsert", err))?;
        Ok(())
    }

    async fn delete(&self, collection: &str, filter: &PointFilter) -> Result<(), RagError> {
        if filter.context_ids.is_empty() {
            return Ok(());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM vector_points");
        push_scope(&mut builder, collection, filter);
        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|err| RagError::store("delete", err))?;
        tracing::debug!(
            "Deleted {} points from '{}'",
            result.rows_affected(),
            collection
        );
        Ok(())
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
        let spec = self.spec_of("search", collection).await?;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT point_id, context_id, file_id, chunk_index, text, source_file_name, mime_type, embedding
             FROM vector_points",
        );
        push_scope(&mut builder, collection, filter);
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|err| RagError::store("search", err))?;

        let mut scored: Vec<ScoredPoint> = rows
            .iter()
            .map(|row| {
                let bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&bytes);
                ScoredPoint {
                    id: row.get("point_id"),
                    score: spec.distance.score(vector, &stored),
                    payload: Self::row_to_payload(row),
                }
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
        if filter.context_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT context_id, file_id, chunk_index, text, source_file_name, mime_type
             FROM vector_points",
        );
        push_scope(&mut builder, collection, filter);
        builder.push(" ORDER BY context_id, file_id, chunk_index");
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|err| RagError::store("scroll", err))?;
        Ok(rows.iter().map(Self::row_to_payload).collect())
    }

    async fn count(&self, collection: &str, filter: &PointFilter) -> Result<usize, RagError> {
        if filter.context_ids.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM vector_points");
        push_scope(&mut builder, collection, filter);
        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|err| RagError::store("count", err))?;
        Ok(count.max(0) as usize)
    }
}
