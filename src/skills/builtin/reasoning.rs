//! Breaking complex requests into assistant commands
//!
//! The model plans a request as a JSON list of short commands. Decomposing
//! only reports the plan; solving also publishes it as a workflow so the
//! driver routes every step.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::events::{EventBus, EventKind};
use crate::model::{GenerateOptions, ModelClient, strip_code_fences};
use crate::response::{Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext, slot};

const PLANNER_PROMPT: &str = "You are the planner of a voice assistant. Break the user's task into \
    short commands the assistant can run one after another, such as \"open spotify\", \
    \"what's the weather in Paris\" or \"set a reminder in 10 minutes\". \
    Reply with a JSON array of strings and nothing else.";

/// Planned steps beyond this are dropped
const MAX_STEPS: usize = 8;

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let model = Arc::clone(&ctx.model);
    let events = ctx.events.clone();
    catalog.register("reasoning", move || {
        Ok(Arc::new(ReasoningSkill::new(Arc::clone(&model), events.clone())) as Arc<dyn Skill>)
    });
}

/// Parse the planner reply into steps
fn parse_plan(reply: &str) -> Option<Vec<String>> {
    let steps: Vec<String> = serde_json::from_str(strip_code_fences(reply)).ok()?;
    let steps: Vec<String> = steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_STEPS)
        .collect();
    (!steps.is_empty()).then_some(steps)
}

#[derive(Debug)]
pub struct ReasoningSkill {
    model: Arc<ModelClient>,
    events: EventBus,
}

impl ReasoningSkill {
    #[must_use]
    pub const fn new(model: Arc<ModelClient>, events: EventBus) -> Self {
        Self { model, events }
    }
}

#[async_trait]
impl Skill for ReasoningSkill {
    fn name(&self) -> &str {
        "reasoning"
    }

    fn intents(&self) -> &[&str] {
        &["decompose_task", "solve_complex"]
    }

    fn description(&self) -> &str {
        "Plan a complex, multi-part request as a sequence of simple assistant commands, optionally running them."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[("task", "The full request to plan")]
    }

    fn examples(&self) -> &[&str] {
        &["help me get ready for my trip", "plan my evening", "break this task into steps"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let Some(task) = slot(entities, "task") else {
            return Ok(SkillResponse::failure("What should I plan?").with_intent(intent));
        };

        let options = GenerateOptions::default().with_system_prompt(PLANNER_PROMPT);
        let reply = self.model.generate_text(task, options).await;
        let Some(steps) = parse_plan(&reply) else {
            tracing::warn!(reply = %reply, "planner reply is not a command list");
            return Ok(SkillResponse::failure("I couldn't break that down into steps.").with_intent(intent));
        };

        tracing::info!(steps = steps.len(), "task planned");
        let numbered: Vec<_> = steps.iter().enumerate().map(|(i, s)| format!("{}. {s}", i + 1)).collect();
        let mut response = SkillResponse::text(format!("Here's the plan: {}", numbered.join("; ")))
            .with_intent(intent)
            .with_data("steps", steps.clone());

        if intent == "solve_complex" {
            self.events.publish(EventKind::WorkflowRequested {
                name: "plan".to_string(),
                steps,
            });
            response.text.push_str(". Working on it.");
        }
        Ok(response)
    }
}
