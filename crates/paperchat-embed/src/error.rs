//! Error types for the embedding backends.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },

    #[error("Expected {expected} vectors, backend returned {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("Expected {expected}-dim vector, backend returned {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
