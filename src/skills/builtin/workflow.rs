//! Named multi-step workflows
//!
//! A workflow is a list of utterances. Running one publishes the steps and
//! the driver feeds each back through the router in order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::Result;
use crate::events::{EventBus, EventKind};
use crate::response::{Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext, slot};

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let path = ctx.config.workflows_path();
    let events = ctx.events.clone();
    catalog.register("workflow", move || {
        let store = Arc::new(WorkflowStore::load(path.clone()));
        Ok(Arc::new(WorkflowSkill::new(store, events.clone())) as Arc<dyn Skill>)
    });
}

/// Split "open spotify, then play jazz" into individual steps
#[must_use]
pub fn split_steps(text: &str) -> Vec<String> {
    text.split(',')
        .flat_map(|part| part.split(" then "))
        .map(|step| step.trim().trim_start_matches("then ").trim())
        .filter(|step| !step.is_empty())
        .map(str::to_string)
        .collect()
}

/// Saved workflows keyed by lowercase name
#[derive(Debug)]
pub struct WorkflowStore {
    path: Option<PathBuf>,
    workflows: Mutex<BTreeMap<String, Vec<String>>>,
}

impl WorkflowStore {
    /// Load workflows from `path`, starting empty if missing or unreadable
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let workflows = match read_workflows(&path) {
            Ok(workflows) => workflows,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load workflows");
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            workflows: Mutex::new(workflows),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            workflows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Save `steps` under `name`, replacing an existing workflow
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be saved
    pub async fn save_workflow(&self, name: &str, steps: Vec<String>) -> Result<()> {
        let mut workflows = self.workflows.lock().await;
        workflows.insert(name.to_lowercase(), steps);

        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string_pretty(&*workflows)?).await?;
        Ok(())
    }

    /// Steps of the workflow called `name`
    pub async fn get(&self, name: &str) -> Option<Vec<String>> {
        self.workflows.lock().await.get(&name.to_lowercase()).cloned()
    }

    /// Saved workflow names
    pub async fn names(&self) -> Vec<String> {
        self.workflows.lock().await.keys().cloned().collect()
    }
}

fn read_workflows(path: &Path) -> Result<BTreeMap<String, Vec<String>>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[derive(Debug)]
pub struct WorkflowSkill {
    store: Arc<WorkflowStore>,
    events: EventBus,
}

impl WorkflowSkill {
    #[must_use]
    pub const fn new(store: Arc<WorkflowStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    async fn create(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let (Some(name), Some(steps)) = (slot(entities, "name"), slot(entities, "steps")) else {
            return Ok(
                SkillResponse::failure("Tell me the workflow name and its steps.").with_intent(intent)
            );
        };

        let steps = split_steps(steps);
        if steps.is_empty() {
            return Ok(SkillResponse::failure("That workflow has no steps.").with_intent(intent));
        }

        let count = steps.len();
        self.store.save_workflow(name, steps).await?;
        tracing::info!(workflow = %name, steps = count, "workflow saved");
        Ok(SkillResponse::text(format!("Saved workflow '{name}' with {count} steps."))
            .with_intent(intent)
            .with_data("steps", count))
    }

    async fn run(&self, intent: &str, entities: &Entities) -> SkillResponse {
        let Some(name) = slot(entities, "name") else {
            return SkillResponse::failure("Which workflow should I run?").with_intent(intent);
        };

        let Some(steps) = self.store.get(name).await else {
            return SkillResponse::failure(format!("I don't know a workflow called '{name}'.")).with_intent(intent);
        };

        let count = steps.len();
        self.events.publish(EventKind::WorkflowRequested {
            name: name.to_string(),
            steps,
        });
        SkillResponse::text(format!("Running workflow '{name}'."))
            .with_intent(intent)
            .with_data("steps", count)
    }
}

#[async_trait]
impl Skill for WorkflowSkill {
    fn name(&self) -> &str {
        "workflow"
    }

    fn intents(&self) -> &[&str] {
        &["create_workflow", "run_workflow"]
    }

    fn description(&self) -> &str {
        "Create a named routine of several commands, or run a saved routine."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[
            ("name", "Workflow name"),
            ("steps", "Commands separated by commas or 'then' (create only)"),
        ]
    }

    fn examples(&self) -> &[&str] {
        &["create a morning routine", "run my morning routine", "start the work workflow"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        if intent == "create_workflow" {
            self.create(intent, entities).await
        } else {
            Ok(self.run(intent, entities).await)
        }
    }
}
