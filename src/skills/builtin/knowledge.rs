//! Local document knowledge base
//!
//! Documents are split into overlapping character windows and stored in
//! their own vector collection, separate from the intent registry.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;
use crate::response::{Entities, SkillResponse};
use crate::semantic::{IndexDocument, VectorIndex};
use crate::skills::{Skill, SkillCatalog, SkillContext, slot};

/// Collection holding document chunks
pub const KNOWLEDGE_COLLECTION: &str = "knowledge_base";

const CHUNK_SIZE: usize = 500;
const CHUNK_OVERLAP: usize = 50;
const TOP_K: usize = 3;

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let index = ctx.knowledge.clone();
    catalog.register("knowledge", move || Ok(Arc::new(KnowledgeSkill::new(index.clone())) as Arc<dyn Skill>));
}

/// Split `text` into windows of `size` characters overlapping by `overlap`
#[must_use]
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

pub struct KnowledgeSkill {
    index: Option<Arc<dyn VectorIndex>>,
}

impl std::fmt::Debug for KnowledgeSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeSkill")
            .field("enabled", &self.index.is_some())
            .finish()
    }
}

impl KnowledgeSkill {
    #[must_use]
    pub fn new(index: Option<Arc<dyn VectorIndex>>) -> Self {
        Self { index }
    }

    async fn ingest(&self, index: &dyn VectorIndex, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let Some(path) = slot(entities, "path") else {
            return Ok(SkillResponse::failure("Which file should I learn?").with_intent(intent));
        };

        let path = Path::new(path);
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read document");
                return Ok(
                    SkillResponse::failure(format!("I couldn't read {}.", path.display())).with_intent(intent)
                );
            }
        };

        let source = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let documents: Vec<_> = chunk_text(&content, CHUNK_SIZE, CHUNK_OVERLAP)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let mut metadata = Map::new();
                metadata.insert("source".to_string(), Value::from(source.clone()));
                metadata.insert("chunk_index".to_string(), Value::from(i));
                IndexDocument {
                    id: format!("{source}_chunk_{i}"),
                    content: chunk,
                    metadata,
                }
            })
            .collect();

        if documents.is_empty() {
            return Ok(SkillResponse::failure(format!("{source} is empty.")).with_intent(intent));
        }

        let count = documents.len();
        index.upsert(documents).await?;
        tracing::info!(source = %source, chunks = count, "document ingested");
        Ok(SkillResponse::text(format!("Learned {source} ({count} chunks)."))
            .with_intent(intent)
            .with_data("chunks", count))
    }

    async fn query(&self, index: &dyn VectorIndex, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let Some(query) = slot(entities, "query") else {
            return Ok(SkillResponse::failure("What should I look up?").with_intent(intent));
        };

        let hits = index.query(query, TOP_K).await?;
        if hits.is_empty() {
            return Ok(SkillResponse::text("I couldn't find any relevant info in my knowledge base.").with_intent(intent));
        }

        let sources: Vec<Value> = hits
            .iter()
            .filter_map(|hit| hit.metadata.get("source").cloned())
            .collect();
        let text = hits.into_iter().map(|hit| hit.content).collect::<Vec<_>>().join("\n\n");
        Ok(SkillResponse::text(text)
            .with_intent(intent)
            .with_data("sources", sources))
    }
}

#[async_trait]
impl Skill for KnowledgeSkill {
    fn name(&self) -> &str {
        "knowledge"
    }

    fn intents(&self) -> &[&str] {
        &["ingest_document", "query_knowledge"]
    }

    fn description(&self) -> &str {
        "Learn a local text document, or answer questions from previously learned documents."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[
            ("path", "File to learn (ingest only)"),
            ("query", "Question to look up (query only)"),
        ]
    }

    fn examples(&self) -> &[&str] {
        &["read this document", "what do my notes say about the project", "search my documents"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let Some(index) = &self.index else {
            return Ok(SkillResponse::failure("Knowledge base unavailable.").with_intent(intent));
        };

        if intent == "ingest_document" {
            self.ingest(index.as_ref(), intent, entities).await
        } else {
            self.query(index.as_ref(), intent, entities).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::semantic::{HashingEmbedder, SqliteVectorIndex};

    fn index() -> Arc<dyn VectorIndex> {
        let pool = db::init_memory().unwrap();
        Arc::new(SqliteVectorIndex::new(
            pool,
            KNOWLEDGE_COLLECTION,
            Arc::new(HashingEmbedder::default()),
        ))
    }

    fn entities(pairs: &[(&str, &str)]) -> Entities {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn chunks_overlap() {
        let text: String = std::iter::repeat_n('a', 1000).collect();
        let chunks = chunk_text(&text, 500, 50);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[1].len(), 500);
        assert_eq!(chunks[2].len(), 100);
        assert!(chunk_text("", 500, 50).is_empty());
        assert_eq!(chunk_text("short", 500, 50), vec!["short"]);
    }

    #[tokio::test]
    async fn ingest_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "The launch code for the project is blue falcon.").unwrap();

        let skill = KnowledgeSkill::new(Some(index()));
        let ingested = skill
            .execute("ingest_document", &entities(&[("path", path.to_str().unwrap())]))
            .await
            .unwrap();
        assert_eq!(ingested.text, "Learned notes.txt (1 chunks).");

        let answer = skill
            .execute("query_knowledge", &entities(&[("query", "launch code for the project")]))
            .await
            .unwrap();
        assert!(answer.text.contains("blue falcon"));
    }

    #[tokio::test]
    async fn empty_base_says_so() {
        let skill = KnowledgeSkill::new(Some(index()));
        let answer = skill
            .execute("query_knowledge", &entities(&[("query", "anything")]))
            .await
            .unwrap();
        assert_eq!(answer.text, "I couldn't find any relevant info in my knowledge base.");
    }

    #[tokio::test]
    async fn disabled_without_index() {
        let skill = KnowledgeSkill::new(None);
        let response = skill.execute("query_knowledge", &Entities::new()).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.text, "Knowledge base unavailable.");
    }
}
