//! Persistent vector index over embedded documents

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::embedder::{Embedder, to_bytes};
use crate::db::DbPool;
use crate::{Error, Result};

/// Document to embed and store
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub id: String,
    pub content: String,
    pub metadata: Map<String, Value>,
}

/// Nearest-neighbour result
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub content: String,
    /// Distance to the query vector; lower is closer
    pub distance: f32,
    pub metadata: Map<String, Value>,
}

/// Embedding-backed document index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert documents, replacing any with the same id
    async fn upsert(&self, documents: Vec<IndexDocument>) -> Result<()>;

    /// Return up to `k` documents nearest to `text`, closest first
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>>;

    /// Drop every document, returning how many were removed
    async fn clear(&self) -> Result<usize>;
}

/// `SQLite` collection using sqlite-vec for L2 distance
///
/// Only vectors produced by the current embedder (same model id and
/// dimension) are compared; documents embedded by another model are ignored
/// until re-registered.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    pool: DbPool,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for SqliteVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorIndex")
            .field("collection", &self.collection)
            .field("model", &self.embedder.model_id())
            .finish_non_exhaustive()
    }
}

impl SqliteVectorIndex {
    /// Open a named collection in the pool
    #[must_use]
    pub fn new(pool: DbPool, collection: &str, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
            embedder,
        }
    }

    /// Collection name
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of stored documents in this collection
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<usize> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            rusqlite::params![self.collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, documents: Vec<IndexDocument>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let mut conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let tx = conn.transaction()?;
        for (doc, embedding) in documents.iter().zip(&embeddings) {
            tx.execute(
                r"INSERT INTO documents (collection, id, content, metadata, embedding, model, dim)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                  ON CONFLICT(collection, id) DO UPDATE SET
                      content = excluded.content,
                      metadata = excluded.metadata,
                      embedding = excluded.embedding,
                      model = excluded.model,
                      dim = excluded.dim,
                      updated_at = datetime('now')",
                rusqlite::params![
                    self.collection,
                    doc.id,
                    doc.content,
                    Value::Object(doc.metadata.clone()).to_string(),
                    to_bytes(embedding),
                    self.embedder.model_id(),
                    i64::try_from(embedding.len()).unwrap_or_default(),
                ],
            )?;
        }
        tx.commit()?;

        tracing::debug!(
            collection = %self.collection,
            count = documents.len(),
            "upserted documents"
        );
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        let embedding = self.embedder.embed(text).await?;

        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let mut stmt = conn.prepare(
            r"SELECT id, content, metadata, vec_distance_l2(embedding, ?1) AS distance
              FROM documents
              WHERE collection = ?2 AND model = ?3 AND dim = ?4
              ORDER BY distance ASC
              LIMIT ?5",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![
                to_bytes(&embedding),
                self.collection,
                self.embedder.model_id(),
                i64::try_from(embedding.len()).unwrap_or_default(),
                i64::try_from(k).unwrap_or(i64::MAX),
            ],
            |row| {
                let metadata: String = row.get(2)?;
                let distance: f32 = row.get(3)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, metadata, distance))
            },
        )?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, content, metadata, distance) = row?;
            let metadata = match serde_json::from_str::<Value>(&metadata) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            hits.push(IndexHit {
                id,
                content,
                distance,
                metadata,
            });
        }
        Ok(hits)
    }

    async fn clear(&self) -> Result<usize> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1",
            rusqlite::params![self.collection],
        )?;
        tracing::debug!(collection = %self.collection, removed, "cleared collection");
        Ok(removed)
    }
}
