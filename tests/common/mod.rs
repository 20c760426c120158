//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use voxshell::config::RoutingConfig;
use voxshell::model::{ModelBackend, ModelRequest, StaticProbe};
use voxshell::response::ChunkStream;
use voxshell::semantic::{HashingEmbedder, IndexDocument, IndexHit, SqliteVectorIndex, VectorIndex};
use voxshell::{
    DbPool, Entities, Error, ModelClient, PatternMatcher, Persona, Result, Router, SemanticMatcher, Skill,
    SkillCatalog, SkillRegistry, SkillResponse, db,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// What a [`FakeSkill`] does when executed
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Successful reply labelled with the intent
    Reply(&'static str),
    /// Successful reply with no intent label
    Unlabelled(&'static str),
    /// `success = false` reply
    Refuse(&'static str),
    /// Reply listing the received entities as `k=v` pairs
    EchoEntities,
    /// Return an error
    Fail,
    /// Panic
    Panic,
}

/// Configurable skill that counts its calls
pub struct FakeSkill {
    pub name: &'static str,
    pub intents: Vec<&'static str>,
    pub description: &'static str,
    pub examples: Vec<&'static str>,
    pub behavior: Behavior,
    pub calls: Arc<AtomicUsize>,
}

impl FakeSkill {
    pub fn new(name: &'static str, intents: &[&'static str], behavior: Behavior) -> Self {
        Self {
            name,
            intents: intents.to_vec(),
            description: "test skill",
            examples: Vec::new(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn describe(mut self, description: &'static str, examples: &[&'static str]) -> Self {
        self.description = description;
        self.examples = examples.to_vec();
        self
    }

    /// Counter shared with every instance built from this one
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn rebuild(&self) -> Self {
        Self {
            name: self.name,
            intents: self.intents.clone(),
            description: self.description,
            examples: self.examples.clone(),
            behavior: self.behavior.clone(),
            calls: Arc::clone(&self.calls),
        }
    }
}

#[async_trait]
impl Skill for FakeSkill {
    fn name(&self) -> &str {
        self.name
    }

    fn intents(&self) -> &[&str] {
        &self.intents
    }

    fn description(&self) -> &str {
        self.description
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[("location", "where")]
    }

    fn examples(&self) -> &[&str] {
        &self.examples
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Reply(text) => Ok(SkillResponse::text(*text).with_intent(intent).with_data("source", "fake")),
            Behavior::Unlabelled(text) => Ok(SkillResponse::text(*text)),
            Behavior::Refuse(text) => Ok(SkillResponse::failure(*text).with_intent(intent)),
            Behavior::EchoEntities => {
                let pairs: Vec<_> = entities.iter().map(|(k, v)| format!("{k}={v}")).collect();
                Ok(SkillResponse::text(pairs.join(",")).with_intent(intent))
            }
            Behavior::Fail => Err(Error::Skill(format!("{} is broken", self.name))),
            Behavior::Panic => panic!("{} exploded", self.name),
        }
    }
}

/// Add `skill` to `catalog`; every load builds a fresh copy sharing its counter
pub fn add(catalog: &mut SkillCatalog, skill: FakeSkill) {
    let label = skill.name;
    catalog.register(label, move || Ok(Arc::new(skill.rebuild()) as Arc<dyn Skill>));
}

/// Model backend replaying queued replies, then a fixed default
pub struct Scripted {
    replies: Mutex<VecDeque<String>>,
    default: String,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn new(replies: &[&str], default: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
            default: default.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Prompts received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, request: &ModelRequest) -> String {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl ModelBackend for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        Ok(self.next(request))
    }

    async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        let reply = self.next(request);
        let chunks: Vec<String> = reply.split_inclusive(' ').map(str::to_string).collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Backend that is never reachable
pub struct Down;

#[async_trait]
impl ModelBackend for Down {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<String> {
        Err(Error::Model("connection refused".to_string()))
    }

    async fn stream(&self, _request: &ModelRequest) -> Result<ChunkStream> {
        Err(Error::Model("connection refused".to_string()))
    }
}

/// Model client with only a local backend
pub fn local_client(local: Arc<dyn ModelBackend>) -> Arc<ModelClient> {
    Arc::new(ModelClient::new(
        None,
        local,
        Arc::new(StaticProbe(false)),
        Arc::new(Persona::new("Vox", "test persona")),
    ))
}

/// Vector index wrapper counting queries
pub struct CountingIndex {
    inner: SqliteVectorIndex,
    pub queries: AtomicUsize,
}

impl CountingIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteVectorIndex::new(setup_test_db(), "intent_registry", Arc::new(HashingEmbedder::default())),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn upsert(&self, documents: Vec<IndexDocument>) -> Result<()> {
        self.inner.upsert(documents).await
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(text, k).await
    }

    async fn clear(&self) -> Result<usize> {
        self.inner.clear().await
    }
}

/// Load `catalog` and wrap it in a router with default thresholds
pub async fn router(catalog: SkillCatalog, semantic: Option<SemanticMatcher>, model: Arc<ModelClient>) -> Router {
    let registry = Arc::new(SkillRegistry::new(catalog, semantic));
    registry.load().await;
    Router::new(RoutingConfig::default(), PatternMatcher::default(), registry, model)
}
