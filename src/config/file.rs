//! TOML configuration file loading
//!
//! Supports `~/.config/voxshell/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: ModelFileConfig,

    #[serde(default)]
    pub routing: RoutingFileConfig,

    #[serde(default)]
    pub semantic: SemanticFileConfig,

    #[serde(default)]
    pub persona: PersonaFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub skills: SkillsFileConfig,
}

/// Model backends
#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    /// `OpenAI`-compatible API base URL
    pub remote_url: Option<String>,
    pub remote_model: Option<String>,
    pub api_key: Option<String>,
    pub remote_timeout_secs: Option<u64>,

    /// Ollama-compatible generate endpoint
    pub local_url: Option<String>,
    pub local_model: Option<String>,
    pub local_timeout_secs: Option<u64>,

    /// URL checked before using the remote backend; empty disables the check
    pub probe_url: Option<String>,
    pub probe_ttl_secs: Option<u64>,

    pub max_tokens: Option<u32>,
}

/// Router thresholds
#[derive(Debug, Default, Deserialize)]
pub struct RoutingFileConfig {
    pub pattern_threshold: Option<f32>,
    pub semantic_threshold: Option<f32>,
}

/// Semantic matching
#[derive(Debug, Default, Deserialize)]
pub struct SemanticFileConfig {
    pub enabled: Option<bool>,

    /// "hashing" or "openai"
    pub embedder: Option<String>,
    pub embedding_model: Option<String>,
    pub db_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
}

/// Voice front-end settings, passed through untouched
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub voice_id: Option<String>,
    pub speed: Option<f32>,
    pub wake_word_sensitivity: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkillsFileConfig {
    pub weather_api_key: Option<String>,
    pub data_dir: Option<String>,
}

/// Parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the config file from the standard path, if present
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_default_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match load_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voxshell/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxshell").join("config.toml"))
}
