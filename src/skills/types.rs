//! Skill type definitions

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::launcher::Launcher;
use crate::Result;
use crate::config::SkillsConfig;
use crate::events::EventBus;
use crate::model::ModelClient;
use crate::profile::ProfileStore;
use crate::response::{Entities, SkillResponse};
use crate::semantic::VectorIndex;

/// A capability bound to one or more intents
///
/// `execute` receives the intent that selected the skill, so a skill owning
/// several intents can branch on it, and exactly the entities the matcher
/// produced (empty after semantic routing). Expected user-facing failures
/// such as a missing slot are returned as `success = false` responses;
/// `Err` is for failures the router should route around.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Implementation name, unique per skill type
    fn name(&self) -> &str;

    /// Intents this skill answers; never empty
    fn intents(&self) -> &[&str];

    /// What the skill does, phrased for both embedding and tool selection
    fn description(&self) -> &str;

    /// Slot name to slot description; documentation only
    fn slots(&self) -> &[(&str, &str)] {
        &[]
    }

    /// Example utterances indexed alongside the description
    fn examples(&self) -> &[&str] {
        &[]
    }

    /// Run the skill
    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse>;
}

/// Shared services handed to skill constructors
#[derive(Clone)]
pub struct SkillContext {
    pub config: SkillsConfig,
    pub model: Arc<ModelClient>,
    pub events: EventBus,
    pub profile: Arc<ProfileStore>,
    /// Document collection for the knowledge skills; `None` disables them
    pub knowledge: Option<Arc<dyn VectorIndex>>,
    pub launcher: Arc<dyn Launcher>,
}

impl std::fmt::Debug for SkillContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillContext")
            .field("config", &self.config)
            .field("model", &self.model)
            .field("knowledge", &self.knowledge.is_some())
            .finish_non_exhaustive()
    }
}

/// One tool offered to the model router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub tool: String,
    pub desc: String,
    pub args: BTreeMap<String, String>,
}

impl ManifestEntry {
    /// Describe `intent` as served by `skill`
    #[must_use]
    pub fn new(intent: &str, skill: &dyn Skill) -> Self {
        Self {
            tool: intent.to_string(),
            desc: skill.description().to_string(),
            args: skill
                .slots()
                .iter()
                .map(|(slot, doc)| ((*slot).to_string(), (*doc).to_string()))
                .collect(),
        }
    }
}

/// Read a slot, treating blank values as absent
#[must_use]
pub fn slot<'a>(entities: &'a Entities, name: &str) -> Option<&'a str> {
    entities.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}
