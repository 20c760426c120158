//! Greetings and goodbyes

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::profile::{DEFAULT_USER_NAME, ProfileStore};
use crate::response::{EXIT_INTENT, Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext};

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let profile = Arc::clone(&ctx.profile);
    catalog.register("conversation", move || {
        Ok(Arc::new(ConversationSkill::new(Arc::clone(&profile))) as Arc<dyn Skill>)
    });
}

/// Small talk the pattern stage answers without the model
#[derive(Debug)]
pub struct ConversationSkill {
    profile: Arc<ProfileStore>,
}

impl ConversationSkill {
    #[must_use]
    pub const fn new(profile: Arc<ProfileStore>) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl Skill for ConversationSkill {
    fn name(&self) -> &str {
        "conversation"
    }

    fn intents(&self) -> &[&str] {
        &["greet", EXIT_INTENT]
    }

    fn description(&self) -> &str {
        "Greet the user, or say goodbye and shut the assistant down."
    }

    fn examples(&self) -> &[&str] {
        &["hello there", "good morning", "goodbye", "that's all for now"]
    }

    async fn execute(&self, intent: &str, _entities: &Entities) -> Result<SkillResponse> {
        if intent == EXIT_INTENT {
            return Ok(SkillResponse::text("Goodbye! Shutting down.").with_intent(EXIT_INTENT));
        }

        let name = self.profile.snapshot().await.name;
        let text = if name == DEFAULT_USER_NAME {
            "Hello! How can I help you?".to_string()
        } else {
            format!("Hello {name}! How can I help you?")
        };
        Ok(SkillResponse::text(text).with_intent("greet"))
    }
}
