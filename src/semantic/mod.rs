//! Vector-similarity intent matching
//!
//! Each registered intent contributes a description document plus one
//! document per example utterance. A query is routed to the intent of its
//! nearest document.

mod embedder;
mod index;

use std::sync::Arc;

use serde_json::{Map, Value};

pub use embedder::{Embedder, HASHING_DIM, HashingEmbedder, OpenAiEmbedder, from_bytes, to_bytes};
pub use index::{IndexDocument, IndexHit, SqliteVectorIndex, VectorIndex};

use crate::Result;

/// Collection holding intent descriptions and examples
pub const INTENT_COLLECTION: &str = "intent_registry";

/// Best semantic candidate for a query
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub intent: String,
    /// `1 / (1 + distance)`, in (0, 1]
    pub score: f32,
}

/// Intent lookup over a vector index
#[derive(Clone)]
pub struct SemanticMatcher {
    index: Arc<dyn VectorIndex>,
}

impl std::fmt::Debug for SemanticMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticMatcher").finish_non_exhaustive()
    }
}

impl SemanticMatcher {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Index an intent's description and example phrases
    ///
    /// Re-registering an intent overwrites its documents in place.
    ///
    /// # Errors
    ///
    /// Returns error if embedding or storage fails
    pub async fn register(&self, intent: &str, description: &str, examples: &[&str]) -> Result<()> {
        let mut documents = Vec::with_capacity(examples.len() + 1);
        documents.push(IndexDocument {
            id: format!("{intent}_desc"),
            content: description.to_string(),
            metadata: metadata(intent, "description"),
        });
        for (i, example) in examples.iter().enumerate() {
            documents.push(IndexDocument {
                id: format!("{intent}_ex_{i}"),
                content: (*example).to_string(),
                metadata: metadata(intent, "example"),
            });
        }

        self.index.upsert(documents).await?;
        tracing::debug!(intent, examples = examples.len(), "registered semantic intent");
        Ok(())
    }

    /// Forget every registered intent
    ///
    /// # Errors
    ///
    /// Returns error if the index cannot be cleared
    pub async fn reset(&self) -> Result<()> {
        let removed = self.index.clear().await?;
        tracing::debug!(removed, "semantic intents cleared");
        Ok(())
    }

    /// Find the intent whose documents lie closest to `query`
    ///
    /// Returns the single best candidate regardless of how close it is; the
    /// caller decides whether the score clears its threshold. `None` means
    /// the index is empty.
    ///
    /// # Errors
    ///
    /// Returns error if embedding or the index query fails
    pub async fn route(&self, query: &str) -> Result<Option<SemanticMatch>> {
        let hits = self.index.query(query, 1).await?;
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let Some(intent) = hit.metadata.get("intent").and_then(Value::as_str) else {
            tracing::warn!(id = %hit.id, "semantic document without intent metadata");
            return Ok(None);
        };

        let score = 1.0 / (1.0 + hit.distance.max(0.0));
        tracing::debug!(intent, score, distance = hit.distance, "semantic candidate");
        Ok(Some(SemanticMatch {
            intent: intent.to_string(),
            score,
        }))
    }
}

fn metadata(intent: &str, kind: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("intent".to_string(), Value::String(intent.to_string()));
    map.insert("kind".to_string(), Value::String(kind.to_string()));
    map
}
