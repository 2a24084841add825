use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the msmd simulator
#[derive(Error, Debug)]
pub enum MsmdError {
    /// Invalid component parameter (non-positive population size, bad mutation rate, ...)
    #[error("Invalid parameter `{name}`: {message}")]
    InvalidParameter { name: String, message: String },

    /// Digests of differing lengths cannot be compared
    #[error("Digest length mismatch: {left} vs {right} characters")]
    DigestLengthMismatch { left: usize, right: usize },

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Offline phase re-run while a prior index is still bound to an engine
    #[error("Shared page index is still in use by a deduplication engine; cannot rebuild")]
    IndexInUse,

    /// Malformed or inconsistent scenario document
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for msmd operations
pub type Result<T> = std::result::Result<T, MsmdError>;
