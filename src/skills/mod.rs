//! Skill registry: intent to skill binding with atomic reload
//!
//! Skills come from a [`SkillCatalog`], an explicit list of constructors.
//! Loading builds a complete intent map, registers every intent with the
//! semantic matcher, and only then swaps the map in. Readers clone the
//! current `Arc` and never observe a half-built map.

pub mod builtin;
mod launcher;
mod types;

pub use launcher::{Launcher, SystemLauncher};
pub use types::{ManifestEntry, Skill, SkillContext, slot};

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;

use crate::response::{Entities, Intent, SkillResponse};
use crate::semantic::SemanticMatcher;
use crate::{Error, Result};

/// Constructor for one skill instance
pub type SkillFactory = Box<dyn Fn() -> Result<Arc<dyn Skill>> + Send + Sync>;

/// Intent to skill map; one instance may own several intents
pub type SkillMap = BTreeMap<Intent, Arc<dyn Skill>>;

/// Ordered list of skill constructors
///
/// Later entries override earlier ones when they declare the same intent.
#[derive(Default)]
pub struct SkillCatalog {
    factories: Vec<(String, SkillFactory)>,
}

impl std::fmt::Debug for SkillCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.iter().map(|(label, _)| label)).finish()
    }
}

impl SkillCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constructor; `label` identifies it in logs
    pub fn register<F>(&mut self, label: &str, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Skill>> + Send + Sync + 'static,
    {
        self.factories.push((label.to_string(), Box::new(factory)));
    }

    /// Builder form of [`register`](Self::register)
    #[must_use]
    pub fn with<F>(mut self, label: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Skill>> + Send + Sync + 'static,
    {
        self.register(label, factory);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Construct every skill once, skipping constructors that fail
    fn instantiate(&self) -> Vec<Arc<dyn Skill>> {
        self.factories
            .iter()
            .filter_map(|(label, factory)| match factory() {
                Ok(skill) => Some(skill),
                Err(e) => {
                    tracing::error!(skill = %label, error = %e, "failed to construct skill");
                    None
                }
            })
            .collect()
    }
}

/// How a contained skill call ended
#[derive(Debug)]
pub enum SkillOutcome {
    /// The skill returned a response, successful or not
    Resolved(SkillResponse),
    /// The skill returned an error or panicked
    Failed(Error),
    /// No skill is bound to the intent
    NotRegistered,
}

/// Registry of loaded skills
pub struct SkillRegistry {
    catalog: SkillCatalog,
    semantic: Option<SemanticMatcher>,
    skills: RwLock<Arc<SkillMap>>,
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("catalog", &self.catalog)
            .field("intents", &self.intents())
            .field("semantic", &self.semantic.is_some())
            .finish()
    }
}

impl SkillRegistry {
    /// Create an empty registry; call [`load`](Self::load) to populate it
    #[must_use]
    pub fn new(catalog: SkillCatalog, semantic: Option<SemanticMatcher>) -> Self {
        Self {
            catalog,
            semantic,
            skills: RwLock::new(Arc::new(SkillMap::new())),
        }
    }

    /// Semantic matcher the registry feeds, if any
    #[must_use]
    pub const fn semantic(&self) -> Option<&SemanticMatcher> {
        self.semantic.as_ref()
    }

    /// Construct all skills and bind their intents
    ///
    /// Returns the number of bound intents.
    pub async fn load(&self) -> usize {
        let map = self.build().await;
        let count = map.len();
        *self.skills.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(map);
        tracing::info!(intents = count, "skills loaded");
        count
    }

    /// Rebuild the map from scratch and swap it in
    ///
    /// Calls already holding the previous snapshot finish against it.
    pub async fn reload(&self) -> usize {
        tracing::info!("reloading skills");
        self.load().await
    }

    async fn build(&self) -> SkillMap {
        let mut map = SkillMap::new();
        for skill in self.catalog.instantiate() {
            tracing::info!(skill = skill.name(), "registering skill");
            if skill.intents().is_empty() {
                tracing::warn!(skill = skill.name(), "skill declares no intents");
            }
            for intent in skill.intents() {
                if let Some(previous) = map.insert((*intent).to_string(), Arc::clone(&skill)) {
                    tracing::warn!(
                        intent,
                        previous = previous.name(),
                        skill = skill.name(),
                        "intent registered twice, last registration wins"
                    );
                }
            }
        }

        if let Some(semantic) = &self.semantic {
            // Documents from intents or examples that no longer exist would
            // otherwise outrank live ones
            if let Err(e) = semantic.reset().await {
                tracing::warn!(error = %e, "failed to clear semantic intents");
            }
            for (intent, skill) in &map {
                if let Err(e) = semantic.register(intent, skill.description(), skill.examples()).await {
                    tracing::warn!(intent = %intent, error = %e, "semantic registration failed");
                }
            }
        }

        map
    }

    /// Current map snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<SkillMap> {
        Arc::clone(&self.skills.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Skill bound to `intent`
    #[must_use]
    pub fn get(&self, intent: &str) -> Option<Arc<dyn Skill>> {
        self.snapshot().get(intent).cloned()
    }

    #[must_use]
    pub fn contains(&self, intent: &str) -> bool {
        self.snapshot().contains_key(intent)
    }

    /// Registered intents, sorted
    #[must_use]
    pub fn intents(&self) -> Vec<Intent> {
        self.snapshot().keys().cloned().collect()
    }

    /// First skill whose implementation name is `name`
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.snapshot().values().find(|s| s.name() == name).cloned()
    }

    /// One tool entry per registered intent, sorted by intent
    #[must_use]
    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.snapshot()
            .iter()
            .map(|(intent, skill)| ManifestEntry::new(intent, skill.as_ref()))
            .collect()
    }

    /// Run the skill for `intent`, containing errors and panics
    pub async fn try_execute(&self, intent: &str, entities: &Entities) -> SkillOutcome {
        let Some(skill) = self.get(intent) else {
            return SkillOutcome::NotRegistered;
        };

        tracing::info!(intent, skill = skill.name(), "executing skill");
        match AssertUnwindSafe(skill.execute(intent, entities)).catch_unwind().await {
            Ok(Ok(response)) => SkillOutcome::Resolved(response),
            Ok(Err(e)) => {
                tracing::error!(intent, skill = skill.name(), error = %e, "skill failed");
                SkillOutcome::Failed(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(intent, skill = skill.name(), panic = %message, "skill panicked");
                SkillOutcome::Failed(Error::Skill(format!("{} panicked: {message}", skill.name())))
            }
        }
    }

    /// Run the skill for `intent`; failures become `success = false` responses
    pub async fn execute(&self, intent: &str, entities: &Entities) -> SkillResponse {
        match self.try_execute(intent, entities).await {
            SkillOutcome::Resolved(response) => response,
            SkillOutcome::Failed(e) => {
                SkillResponse::failure(format!("Error executing skill: {e}")).with_intent(intent)
            }
            SkillOutcome::NotRegistered => {
                SkillResponse::failure(format!("I'm not sure how to handle '{intent}'.")).with_intent(intent)
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
