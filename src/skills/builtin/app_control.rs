//! Opening and closing desktop applications

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::response::{Entities, SkillResponse};
use crate::skills::{Launcher, Skill, SkillCatalog, SkillContext, slot};

/// Applications the assistant refuses to close
const PROTECTED_APPS: &[&str] = &["finder", "dock", "loginwindow", "voxshell", "python", "terminal", "iterm"];

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let launcher = Arc::clone(&ctx.launcher);
    catalog.register("app_control", move || {
        Ok(Arc::new(AppControlSkill::new(Arc::clone(&launcher))) as Arc<dyn Skill>)
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Open,
    Close,
}

pub struct AppControlSkill {
    launcher: Arc<dyn Launcher>,
}

impl std::fmt::Debug for AppControlSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppControlSkill").finish_non_exhaustive()
    }
}

impl AppControlSkill {
    #[must_use]
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }
}

/// Work out the action and target from the intent and slots
///
/// `control_app` carries the action in a slot; a free-form `query` such as
/// "close spotify" is split as a last resort.
fn resolve(intent: &str, entities: &Entities) -> (Action, Option<String>) {
    let mut app = slot(entities, "app_name").map(str::to_string);
    let mut action = match intent {
        "close_app" => Action::Close,
        "open_app" => Action::Open,
        _ => match slot(entities, "action").map(str::to_lowercase).as_deref() {
            Some("close" | "quit" | "kill" | "exit") => Action::Close,
            _ => Action::Open,
        },
    };

    if let (true, Some(query)) = (app.is_none(), slot(entities, "query")) {
        let (verb, rest) = query.split_once(' ').unwrap_or((query, ""));
        match verb.to_lowercase().as_str() {
            "close" | "quit" => action = Action::Close,
            "open" | "launch" | "start" => action = Action::Open,
            _ => {}
        }
        let rest = rest.trim();
        if !rest.is_empty() {
            app = Some(rest.to_string());
        }
    }

    let app = app
        .map(|a| a.trim().trim_end_matches(['.', '!', '?']).trim_end().to_string())
        .filter(|a| !a.is_empty());
    (action, app)
}

/// Whether `app` names or mentions an application that must stay open
fn is_protected(app: &str) -> bool {
    let app = app.to_lowercase();
    PROTECTED_APPS.iter().any(|p| app.contains(p))
}

#[async_trait]
impl Skill for AppControlSkill {
    fn name(&self) -> &str {
        "app_control"
    }

    fn intents(&self) -> &[&str] {
        &["control_app", "open_app", "close_app"]
    }

    fn description(&self) -> &str {
        "Open or close applications on the computer."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[("action", "open or close"), ("app_name", "Application name")]
    }

    fn examples(&self) -> &[&str] {
        &["launch spotify", "start the calculator", "quit safari", "shut the music app"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let (action, app) = resolve(intent, entities);
        let Some(app) = app else {
            return Ok(SkillResponse::failure("Which application?").with_intent(intent));
        };

        match action {
            Action::Open => {
                self.launcher.open_app(&app).await?;
                Ok(SkillResponse::text(format!("Opening {app}."))
                    .with_intent(intent)
                    .with_data("app", app))
            }
            Action::Close => {
                if is_protected(&app) {
                    tracing::warn!(app = %app, "refusing to close protected app");
                    return Ok(SkillResponse::failure(format!("I can't close {app}.")).with_intent(intent));
                }
                self.launcher.close_app(&app).await?;
                Ok(SkillResponse::text(format!("Closing {app}."))
                    .with_intent(intent)
                    .with_data("app", app))
            }
        }
    }
}
