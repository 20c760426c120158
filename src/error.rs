//! Error types for voxshell

use thiserror::Error;

/// Result type alias for voxshell operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant shell
///
/// Expected fallback paths (no match, backend offline, malformed model output)
/// are modelled as values at each stage boundary. These variants cover contract
/// violations and I/O failures underneath them.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Skill construction or execution error
    #[error("skill error: {0}")]
    Skill(String),

    /// Model backend error
    #[error("model error: {0}")]
    Model(String),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
