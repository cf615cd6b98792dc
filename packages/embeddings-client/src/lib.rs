//! Minimal OpenAI embeddings API client.
//!
//! Wraps the `/v1/embeddings` endpoint with typed errors. Retry and
//! batching policy belong to callers; this client does one request per
//! call.

pub mod error;
pub mod types;

pub use error::{EmbeddingsError, Result};
pub use types::{EmbeddingData, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};

use reqwest::Client;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Client for the OpenAI embeddings endpoint.
pub struct EmbeddingsClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl EmbeddingsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the embedding model (default: text-embedding-3-small).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (for proxies and test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an embedding vector for the given text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.api_key.is_empty() {
            return Err(EmbeddingsError::Config("API key is empty".to_string()));
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbeddingRequest {
                model: self.model.clone(),
                input: text.to_string(),
                encoding_format: "float".to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Embeddings API returned an error");
            return Err(EmbeddingsError::Api(format!("{}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingsError::Parse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingsError::Api("no embedding returned".to_string()))
    }
}
