//! Remembering things about the user

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::profile::{DEFAULT_USER_NAME, ProfileStore};
use crate::response::{Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext, slot};

/// Leading words that turn an "update" into a question
const QUESTION_WORDS: &[&str] = &["what", "who", "where", "when", "why", "how", "do", "does", "is", "am"];

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let profile = Arc::clone(&ctx.profile);
    catalog.register("profile", move || Ok(Arc::new(ProfileSkill::new(Arc::clone(&profile))) as Arc<dyn Skill>));
}

fn is_question(value: &str) -> bool {
    let first = value
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    value.trim_end().ends_with('?') || QUESTION_WORDS.contains(&first.as_str())
}

#[derive(Debug)]
pub struct ProfileSkill {
    profile: Arc<ProfileStore>,
}

impl ProfileSkill {
    #[must_use]
    pub const fn new(profile: Arc<ProfileStore>) -> Self {
        Self { profile }
    }

    async fn describe(&self) -> String {
        let profile = self.profile.snapshot().await;
        let mut text = if profile.name == DEFAULT_USER_NAME {
            "I don't know your name yet.".to_string()
        } else {
            format!("You are {}.", profile.name)
        };

        if !profile.preferences.is_empty() {
            let preferences: Vec<_> = profile.preferences.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            let _ = write!(text, " Your preferences: {}.", preferences.join(", "));
        }
        if !profile.facts.is_empty() {
            let _ = write!(text, " I also know: {}.", profile.facts.join("; "));
        }
        text
    }

    async fn update(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let Some(value) = slot(entities, "value") else {
            return Ok(SkillResponse::failure("What should I remember?").with_intent(intent));
        };
        if is_question(value) {
            return Ok(SkillResponse::text(self.describe().await).with_intent("get_profile"));
        }

        let key = slot(entities, "key").map(str::to_lowercase);
        let text = match key.as_deref() {
            Some("name") => {
                self.profile.set_name(value).await?;
                format!("Nice to meet you, {value}.")
            }
            None | Some("fact") => {
                if self.profile.add_fact(value).await? {
                    format!("I've noted that: {value}")
                } else {
                    "I already knew that.".to_string()
                }
            }
            Some(key) => {
                self.profile.set_preference(key, value).await?;
                format!("Got it, your {key} is {value}.")
            }
        };
        Ok(SkillResponse::text(text).with_intent(intent))
    }
}

#[async_trait]
impl Skill for ProfileSkill {
    fn name(&self) -> &str {
        "profile"
    }

    fn intents(&self) -> &[&str] {
        &["update_profile", "get_profile"]
    }

    fn description(&self) -> &str {
        "Remember the user's name, preferences and facts about them, or recall what is known."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[
            ("key", "'name', 'fact', or a preference name"),
            ("value", "The value to remember"),
        ]
    }

    fn examples(&self) -> &[&str] {
        &["my name is Sam", "remember that I like coffee", "what do you know about me"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        if intent == "get_profile" {
            return Ok(SkillResponse::text(self.describe().await).with_intent(intent));
        }
        self.update(intent, entities).await
    }
}
