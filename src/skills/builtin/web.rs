//! Web search and YouTube playback in the default browser

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::response::{Entities, SkillResponse};
use crate::skills::{Launcher, Skill, SkillCatalog, SkillContext, slot};

const GOOGLE_SEARCH_URL: &str = "https://www.google.com/search?q=";
const YOUTUBE_SEARCH_URL: &str = "https://www.youtube.com/results?search_query=";

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let launcher = Arc::clone(&ctx.launcher);
    catalog.register("web", move || Ok(Arc::new(WebSkill::new(Arc::clone(&launcher))) as Arc<dyn Skill>));
}

pub struct WebSkill {
    launcher: Arc<dyn Launcher>,
}

impl std::fmt::Debug for WebSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSkill").finish_non_exhaustive()
    }
}

impl WebSkill {
    #[must_use]
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }
}

fn search_url(base: &str, query: &str) -> String {
    format!("{base}{}", urlencoding::encode(query))
}

#[async_trait]
impl Skill for WebSkill {
    fn name(&self) -> &str {
        "web"
    }

    fn intents(&self) -> &[&str] {
        &["google_search", "play_youtube"]
    }

    fn description(&self) -> &str {
        "Search the web with Google or play a video or song on YouTube."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[("query", "What to search for or play")]
    }

    fn examples(&self) -> &[&str] {
        &["look up rust tutorials", "find recipes for pancakes", "put on some jazz music"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let Some(query) = slot(entities, "query") else {
            let prompt = if intent == "play_youtube" {
                "What should I play?"
            } else {
                "What should I search for?"
            };
            return Ok(SkillResponse::failure(prompt).with_intent(intent));
        };

        let (url, text) = if intent == "play_youtube" {
            (search_url(YOUTUBE_SEARCH_URL, query), format!("Playing {query} on YouTube."))
        } else {
            (search_url(GOOGLE_SEARCH_URL, query), format!("Opened Google Search for {query}."))
        };

        tracing::debug!(url = %url, "opening browser");
        self.launcher.open_url(&url).await?;
        Ok(SkillResponse::text(text).with_intent(intent).with_data("url", url))
    }
}
