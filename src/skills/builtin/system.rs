//! Assistant self-management: skill reload and log level

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::events::{EventBus, EventKind};
use crate::response::{Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext, slot};

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let events = ctx.events.clone();
    catalog.register("system", move || Ok(Arc::new(SystemSkill::new(events.clone())) as Arc<dyn Skill>));
}

/// Map a spoken level onto a tracing filter directive
fn normalize_level(level: &str) -> Option<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

#[derive(Debug)]
pub struct SystemSkill {
    events: EventBus,
}

impl SystemSkill {
    #[must_use]
    pub const fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Skill for SystemSkill {
    fn name(&self) -> &str {
        "system"
    }

    fn intents(&self) -> &[&str] {
        &["reload_skills", "set_log_level"]
    }

    fn description(&self) -> &str {
        "Reload the assistant's skills or change how much it logs."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[("level", "trace, debug, info, warn or error (log level only)")]
    }

    fn examples(&self) -> &[&str] {
        &["refresh your skills", "turn on debug logging"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        if intent == "reload_skills" {
            self.events.publish(EventKind::ReloadRequested);
            return Ok(SkillResponse::text("Reloading skills...").with_intent(intent));
        }

        let requested = slot(entities, "level").unwrap_or_default();
        let Some(level) = normalize_level(requested) else {
            return Ok(SkillResponse::failure(format!(
                "'{requested}' isn't a log level. Use trace, debug, info, warn or error."
            ))
            .with_intent(intent));
        };

        self.events.publish(EventKind::LogLevelRequested {
            level: level.to_string(),
        });
        Ok(SkillResponse::text(format!("Log level set to {level}."))
            .with_intent(intent)
            .with_data("level", level))
    }
}
