//! Assistant persona and default system prompt

use std::sync::Arc;

use crate::profile::ProfileStore;

/// Default assistant name
pub const DEFAULT_NAME: &str = "Vox";

/// Default system prompt, tuned for replies that will be spoken aloud
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Vox, a helpful voice assistant running on the user's computer.
You are concise and friendly, with a light sense of humour.
Your replies are read aloud by a speech synthesizer:
- Do not use markdown, lists or emoji.
- Use natural punctuation.
- Keep replies under two sentences unless the user asks for detail.";

/// Identity the model speaks as
///
/// The system prompt handed to the model is the persona prompt followed by
/// the current user-profile context, so facts the user shares are visible
/// to every later request.
#[derive(Debug, Clone)]
pub struct Persona {
    name: String,
    system_prompt: String,
    profile: Option<Arc<ProfileStore>>,
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(DEFAULT_NAME, DEFAULT_SYSTEM_PROMPT)
    }
}

impl Persona {
    #[must_use]
    pub fn new(name: &str, system_prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            system_prompt: system_prompt.to_string(),
            profile: None,
        }
    }

    /// Append the given profile's context to every system prompt
    #[must_use]
    pub fn with_profile(mut self, profile: Arc<ProfileStore>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Get the display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Persona prompt without profile context
    #[must_use]
    pub fn base_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Full system prompt with the current profile context
    pub async fn system_prompt(&self) -> String {
        match &self.profile {
            Some(profile) => format!("{}\n\n{}", self.system_prompt, profile.context_string().await),
            None => self.system_prompt.clone(),
        }
    }
}
