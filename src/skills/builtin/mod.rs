//! Built-in skills
//!
//! Each module exposes a `register` function adding its constructor to the
//! catalog. Registration order matters only for duplicate intents: a later
//! module overrides an earlier one.

mod app_control;
mod conversation;
mod date_time;
mod knowledge;
mod profile;
mod reasoning;
mod scheduler;
mod system;
mod weather;
mod web;
mod workflow;

pub use app_control::AppControlSkill;
pub use conversation::ConversationSkill;
pub use date_time::DateTimeSkill;
pub use knowledge::{KNOWLEDGE_COLLECTION, KnowledgeSkill, chunk_text};
pub use profile::ProfileSkill;
pub use reasoning::ReasoningSkill;
pub use scheduler::{Reminder, ReminderStore, SchedulerSkill, parse_when};
pub use system::SystemSkill;
pub use weather::{WeatherEndpoints, WeatherSkill};
pub use web::WebSkill;
pub use workflow::{WorkflowSkill, WorkflowStore, split_steps};

use super::{SkillCatalog, SkillContext};

/// Catalog of every built-in skill
#[must_use]
pub fn catalog(ctx: &SkillContext) -> SkillCatalog {
    let mut catalog = SkillCatalog::new();
    conversation::register(&mut catalog, ctx);
    date_time::register(&mut catalog, ctx);
    weather::register(&mut catalog, ctx);
    app_control::register(&mut catalog, ctx);
    web::register(&mut catalog, ctx);
    scheduler::register(&mut catalog, ctx);
    workflow::register(&mut catalog, ctx);
    system::register(&mut catalog, ctx);
    profile::register(&mut catalog, ctx);
    knowledge::register(&mut catalog, ctx);
    reasoning::register(&mut catalog, ctx);
    catalog
}
