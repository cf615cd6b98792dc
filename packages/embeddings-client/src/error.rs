//! Error types for the embeddings client.

use thiserror::Error;

/// Result type for embeddings client operations.
pub type Result<T> = std::result::Result<T, EmbeddingsError>;

/// Embeddings client errors.
#[derive(Debug, Error)]
pub enum EmbeddingsError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("API error: {0}")]
    Api(String),

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for EmbeddingsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EmbeddingsError::Parse(err.to_string())
        } else {
            EmbeddingsError::Network(err.to_string())
        }
    }
}
