//! Configuration management for voxshell
//!
//! Precedence is environment variable, then TOML file, then built-in default.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::model::{
    DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_TIMEOUT, DEFAULT_LOCAL_URL, DEFAULT_MAX_TOKENS, DEFAULT_PROBE_URL,
    DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_TIMEOUT, DEFAULT_REMOTE_URL,
};
use crate::persona::{DEFAULT_NAME, DEFAULT_SYSTEM_PROMPT};
use crate::{Error, Result};

use self::file::ConfigFile;

/// Default embeddings model for the `OpenAI` embedder
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// voxshell configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub routing: RoutingConfig,
    pub semantic: SemanticConfig,
    pub persona: PersonaConfig,
    pub voice: VoiceConfig,
    pub skills: SkillsConfig,
}

/// Model backends and the connectivity probe
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub remote_url: String,
    pub remote_model: String,

    /// Remote tier is disabled without a key
    pub api_key: Option<SecretString>,
    /// Exceeding it counts as a remote failure
    pub remote_timeout: Duration,

    pub local_url: String,
    pub local_model: String,
    pub local_timeout: Duration,

    /// `None` skips the probe and treats the network as reachable
    pub probe_url: Option<String>,
    pub probe_ttl: Duration,

    pub max_tokens: u32,
}

/// Minimum confidences for the pattern and semantic stages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingConfig {
    /// Pattern confidence must exceed this (strictly)
    pub pattern_threshold: f32,

    /// Semantic score must exceed this (strictly)
    pub semantic_threshold: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            pattern_threshold: 0.7,
            semantic_threshold: 0.65,
        }
    }
}

/// Which embedder backs semantic matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    /// Offline feature hashing
    #[default]
    Hashing,
    /// `OpenAI` embeddings API (needs the model API key)
    OpenAi,
}

impl std::str::FromStr for EmbedderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "hash" | "local" => Ok(Self::Hashing),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown embedder: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SemanticConfig {
    pub enabled: bool,
    pub embedder: EmbedderKind,
    pub embedding_model: String,
    pub db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PersonaConfig {
    pub name: String,
    pub system_prompt: String,
}

/// Settings for the speech front-end; carried but not interpreted here
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub voice_id: Option<String>,
    pub speed: f32,
    pub wake_word_sensitivity: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: None,
            speed: 1.0,
            wake_word_sensitivity: 0.5,
        }
    }
}

/// Skill credentials and storage
#[derive(Debug, Clone)]
pub struct SkillsConfig {
    pub weather_api_key: Option<SecretString>,

    /// Directory for reminders, workflows and the user profile
    pub data_dir: PathBuf,
}

impl SkillsConfig {
    #[must_use]
    pub fn reminders_path(&self) -> PathBuf {
        self.data_dir.join("reminders.json")
    }

    #[must_use]
    pub fn workflows_path(&self) -> PathBuf {
        self.data_dir.join("workflows.json")
    }

    #[must_use]
    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join("user_profile.json")
    }
}

/// Return the data directory: `~/.local/share/voxshell` on Linux
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/voxshell"),
        |d| d.data_dir().join("voxshell"),
    )
}

impl Default for Config {
    fn default() -> Self {
        Self::from_sources(ConfigFile::default(), |_| None)
    }
}

impl Config {
    /// Load configuration from the environment and a TOML file
    ///
    /// With `path`, that file must exist and parse. Without it, the standard
    /// location is used when present.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be loaded or a value
    /// is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::load_config_file(path)?,
            None => file::load_default_config_file(),
        };
        let config = Self::from_sources(fc, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed file with an environment lookup
    pub fn from_sources<F>(fc: ConfigFile, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("OPENAI_API_KEY")
            .or(fc.model.api_key)
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        // An explicitly empty probe URL disables the check
        let probe_url = env("VOXSHELL_PROBE_URL")
            .or(fc.model.probe_url)
            .map_or_else(|| Some(DEFAULT_PROBE_URL.to_string()), |u| (!u.trim().is_empty()).then_some(u));

        let model = ModelConfig {
            remote_url: non_empty("VOXSHELL_REMOTE_URL")
                .or(fc.model.remote_url)
                .unwrap_or_else(|| DEFAULT_REMOTE_URL.to_string()),
            remote_model: non_empty("VOXSHELL_REMOTE_MODEL")
                .or(fc.model.remote_model)
                .unwrap_or_else(|| DEFAULT_REMOTE_MODEL.to_string()),
            api_key,
            remote_timeout: fc
                .model
                .remote_timeout_secs
                .map_or(DEFAULT_REMOTE_TIMEOUT, Duration::from_secs),
            local_url: non_empty("LOCAL_LLM_URL")
                .or(fc.model.local_url)
                .unwrap_or_else(|| DEFAULT_LOCAL_URL.to_string()),
            local_model: non_empty("LOCAL_LLM_MODEL")
                .or(fc.model.local_model)
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            local_timeout: fc
                .model
                .local_timeout_secs
                .map_or(DEFAULT_LOCAL_TIMEOUT, Duration::from_secs),
            probe_url,
            probe_ttl: Duration::from_secs(fc.model.probe_ttl_secs.unwrap_or(30)),
            max_tokens: fc.model.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let defaults = RoutingConfig::default();
        let routing = RoutingConfig {
            pattern_threshold: fc.routing.pattern_threshold.unwrap_or(defaults.pattern_threshold),
            semantic_threshold: fc.routing.semantic_threshold.unwrap_or(defaults.semantic_threshold),
        };

        let data_dir = non_empty("VOXSHELL_DATA_DIR")
            .or(fc.skills.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        let embedder = match non_empty("VOXSHELL_EMBEDDER").or(fc.semantic.embedder) {
            Some(kind) => kind.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to hashing embedder");
                EmbedderKind::Hashing
            }),
            None => EmbedderKind::default(),
        };

        let semantic = SemanticConfig {
            enabled: fc.semantic.enabled.unwrap_or(true),
            embedder,
            embedding_model: fc
                .semantic
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            db_path: fc
                .semantic
                .db_path
                .map_or_else(|| data_dir.join("voxshell.db"), PathBuf::from),
        };

        let persona = PersonaConfig {
            name: fc.persona.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            system_prompt: fc
                .persona
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            voice_id: fc.voice.voice_id,
            speed: fc.voice.speed.unwrap_or(voice_defaults.speed),
            wake_word_sensitivity: fc
                .voice
                .wake_word_sensitivity
                .unwrap_or(voice_defaults.wake_word_sensitivity),
        };

        let skills = SkillsConfig {
            weather_api_key: non_empty("WEATHER_API_KEY")
                .or(fc.skills.weather_api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            data_dir,
        };

        Self {
            model,
            routing,
            semantic,
            persona,
            voice,
            skills,
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns error naming the first out-of-range value
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("routing.pattern_threshold", self.routing.pattern_threshold),
            ("routing.semantic_threshold", self.routing.semantic_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{name} must be between 0 and 1, got {value}")));
            }
        }

        for (name, value) in [
            ("model.remote_timeout_secs", self.model.remote_timeout),
            ("model.local_timeout_secs", self.model.local_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        if self.semantic.enabled && self.semantic.embedder == EmbedderKind::OpenAi && self.model.api_key.is_none() {
            return Err(Error::Config(
                "semantic.embedder = \"openai\" requires OPENAI_API_KEY".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_sources(ConfigFile::default(), |_| None);
        assert!(config.model.api_key.is_none());
        assert_eq!(config.model.local_url, DEFAULT_LOCAL_URL);
        assert_eq!(config.model.probe_url.as_deref(), Some(DEFAULT_PROBE_URL));
        assert_eq!(config.routing, RoutingConfig::default());
        assert_eq!(config.semantic.embedder, EmbedderKind::Hashing);
        assert!(config.semantic.enabled);
        assert_eq!(config.persona.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.model.remote_timeout, DEFAULT_REMOTE_TIMEOUT);
        assert_eq!(config.model.local_timeout, DEFAULT_LOCAL_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn timeouts_from_file() {
        let fc: ConfigFile = toml::from_str(
            r"
            [model]
            remote_timeout_secs = 5
            local_timeout_secs = 0
            ",
        )
        .unwrap();

        let config = Config::from_sources(fc, |_| None);
        assert_eq!(config.model.remote_timeout, Duration::from_secs(5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [model]
            local_model = "mistral"
            api_key = "from-file"

            [routing]
            semantic_threshold = 0.8
            "#,
        )
        .unwrap();

        let config = Config::from_sources(fc, env(&[("OPENAI_API_KEY", "from-env"), ("LOCAL_LLM_MODEL", "phi3")]));
        assert_eq!(config.model.api_key.unwrap().expose_secret(), "from-env");
        assert_eq!(config.model.local_model, "phi3");
        assert!((config.routing.semantic_threshold - 0.8).abs() < f32::EPSILON);
        assert!((config.routing.pattern_threshold - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn data_dir_drives_derived_paths() {
        let config = Config::from_sources(ConfigFile::default(), env(&[("VOXSHELL_DATA_DIR", "/tmp/vox")]));
        assert_eq!(config.skills.data_dir, PathBuf::from("/tmp/vox"));
        assert_eq!(config.semantic.db_path, PathBuf::from("/tmp/vox/voxshell.db"));
        assert_eq!(config.skills.reminders_path(), PathBuf::from("/tmp/vox/reminders.json"));
    }

    #[test]
    fn empty_probe_url_disables_probe() {
        let config = Config::from_sources(ConfigFile::default(), env(&[("VOXSHELL_PROBE_URL", "")]));
        assert!(config.model.probe_url.is_none());
    }

    #[test]
    fn empty_api_key_is_absent() {
        let config = Config::from_sources(ConfigFile::default(), env(&[("OPENAI_API_KEY", "  ")]));
        assert!(config.model.api_key.is_none());
    }

    #[test]
    fn embedder_parsing() {
        assert_eq!("OpenAI".parse::<EmbedderKind>().unwrap(), EmbedderKind::OpenAi);
        assert!("word2vec".parse::<EmbedderKind>().is_err());

        let config = Config::from_sources(ConfigFile::default(), env(&[("VOXSHELL_EMBEDDER", "bogus")]));
        assert_eq!(config.semantic.embedder, EmbedderKind::Hashing);
    }

    #[test]
    fn openai_embedder_needs_key() {
        let config = Config::from_sources(ConfigFile::default(), env(&[("VOXSHELL_EMBEDDER", "openai")]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = Config::default();
        config.routing.pattern_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[persona]\nname = \"Juniper\"\n\n[voice]\nspeed = 1.25\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.persona.name, "Juniper");
        assert!((config.voice.speed - 1.25).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(toml::from_str::<ConfigFile>("[server]\nport = 1").is_err());
    }
}
