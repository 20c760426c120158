//! Persistent user profile
//!
//! Holds the user's name, preferences and remembered facts. The profile is
//! injected into the model's system prompt so replies can be personalised.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;

/// Name used until the user introduces themselves
pub const DEFAULT_USER_NAME: &str = "User";

/// What the assistant knows about the user
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserProfile {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub preferences: BTreeMap<String, String>,

    #[serde(default)]
    pub facts: Vec<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: default_name(),
            preferences: BTreeMap::new(),
            facts: Vec::new(),
        }
    }
}

fn default_name() -> String {
    DEFAULT_USER_NAME.to_string()
}

impl UserProfile {
    /// Plain-text summary for the model's context
    #[must_use]
    pub fn context_string(&self) -> String {
        let mut context = format!("User Name: {}\n", self.name);

        if !self.preferences.is_empty() {
            context.push_str("Preferences:\n");
            for (key, value) in &self.preferences {
                let _ = writeln!(context, "- {key}: {value}");
            }
        }

        if !self.facts.is_empty() {
            context.push_str("Facts about user:\n");
            for fact in &self.facts {
                let _ = writeln!(context, "- {fact}");
            }
        }

        context
    }
}

/// Profile shared between skills and the persona, optionally backed by a file
#[derive(Debug)]
pub struct ProfileStore {
    path: Option<PathBuf>,
    profile: RwLock<UserProfile>,
}

impl ProfileStore {
    /// Load the profile from `path`, starting fresh if missing or unreadable
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profile = match read_profile(&path) {
            Ok(Some(profile)) => profile,
            Ok(None) => UserProfile::default(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load user profile");
                UserProfile::default()
            }
        };

        Self {
            path: Some(path),
            profile: RwLock::new(profile),
        }
    }

    /// Profile that is never written to disk
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            profile: RwLock::new(UserProfile::default()),
        }
    }

    /// Copy of the current profile
    pub async fn snapshot(&self) -> UserProfile {
        self.profile.read().await.clone()
    }

    /// Context string of the current profile
    pub async fn context_string(&self) -> String {
        self.profile.read().await.context_string()
    }

    /// Change the user's name
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be saved
    pub async fn set_name(&self, name: &str) -> Result<()> {
        let mut profile = self.profile.write().await;
        profile.name = name.to_string();
        self.save(&profile).await
    }

    /// Record a preference, replacing any previous value for `key`
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be saved
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        let mut profile = self.profile.write().await;
        profile.preferences.insert(key.to_string(), value.to_string());
        self.save(&profile).await
    }

    /// Remember a fact; returns false if it was already known
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be saved
    pub async fn add_fact(&self, fact: &str) -> Result<bool> {
        let mut profile = self.profile.write().await;
        if profile.facts.iter().any(|f| f == fact) {
            return Ok(false);
        }
        profile.facts.push(fact.to_string());
        self.save(&profile).await?;
        Ok(true)
    }

    async fn save(&self, profile: &UserProfile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(profile)?;
        tokio::fs::write(path, json).await?;
        tracing::debug!(path = %path.display(), "saved user profile");
        Ok(())
    }
}

fn read_profile(path: &Path) -> Result<Option<UserProfile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}
