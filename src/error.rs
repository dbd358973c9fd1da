use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::llm::LlmError;
use crate::rerank::RerankError;

/// Main error type for Docent
#[derive(Error, Debug)]
pub enum DocentError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A provider needs an API key that is not present in the environment
    #[error("Missing credential for {provider}: environment variable {env} is not set")]
    MissingCredential { provider: String, env: String },

    /// Persisted index missing, corrupt or unreadable
    #[error("Storage error: {0}")]
    Storage(#[from] IndexError),

    /// Embedding, language-model or rerank service failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// A message arrived before the session pipeline was built
    #[error("Session is not initialized: {0}")]
    NotInitialized(String),

    /// Query exceeded the configured deadline
    #[error("Query timed out after {0:?}")]
    QueryTimeout(std::time::Duration),

    /// Query was cancelled by the client
    #[error("Query cancelled")]
    Cancelled,

    /// Chat server errors
    #[error("Server error: {0}")]
    Server(String),

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

/// Coarse classification of failures, reported to chat clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Storage,
    Provider,
    Protocol,
    Timeout,
    Cancelled,
    Internal,
}

impl DocentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocentError::Config(_)
            | DocentError::ConfigValidation { .. }
            | DocentError::ConfigNotFound { .. }
            | DocentError::InvalidConfigValue { .. }
            | DocentError::MissingCredential { .. }
            | DocentError::Toml(_) => ErrorKind::Configuration,
            DocentError::Storage(_) => ErrorKind::Storage,
            DocentError::Provider(_) => ErrorKind::Provider,
            DocentError::NotInitialized(_) => ErrorKind::Protocol,
            DocentError::QueryTimeout(_) => ErrorKind::Timeout,
            DocentError::Cancelled => ErrorKind::Cancelled,
            DocentError::Server(_)
            | DocentError::Io { .. }
            | DocentError::TomlSerialization(_)
            | DocentError::Json { .. }
            | DocentError::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<EmbeddingError> for DocentError {
    fn from(err: EmbeddingError) -> Self {
        DocentError::Provider(format!("embedding: {}", err))
    }
}

impl From<LlmError> for DocentError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => DocentError::Cancelled,
            other => DocentError::Provider(format!("llm: {}", other)),
        }
    }
}

impl From<RerankError> for DocentError {
    fn from(err: RerankError) -> Self {
        DocentError::Provider(format!("rerank: {}", err))
    }
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

/// Result type for Docent operations
pub type Result<T> = std::result::Result<T, DocentError>;
