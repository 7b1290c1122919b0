//! Custom error types for kbase

use thiserror::Error;

/// Main error type for kbase operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Stale index mapping: row {row} does not match the chunk table ({chunk_count} chunks)")]
    StaleIndexMapping { row: usize, chunk_count: usize },

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream error: {message}")]
    Upstream { message: String, transient: bool },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt index file: {0}")]
    CorruptIndex(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not initialized: run 'kbase init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an upstream error that is worth retrying
    pub fn transient(message: impl Into<String>) -> Self {
        Error::Upstream {
            message: message.into(),
            transient: true,
        }
    }

    /// Build an upstream error that retrying will not fix
    pub fn permanent(message: impl Into<String>) -> Self {
        Error::Upstream {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether a bounded retry may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::UpstreamTimeout(_) => true,
            Error::Upstream { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Classify a reqwest failure from an embedding or LLM backend
    pub fn from_upstream(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Error::UpstreamTimeout(format!("{}: {}", context, err));
        }

        let transient = match err.status() {
            Some(status) => status.is_server_error() || status.as_u16() == 429,
            None => err.is_connect() || err.is_request(),
        };

        Error::Upstream {
            message: format!("{}: {}", context, err),
            transient,
        }
    }
}

/// Result type alias for kbase
pub type Result<T> = std::result::Result<T, Error>;
