//! OpenAI-backed implementation of the embedding service trait.

use anyhow::Result;
use async_trait::async_trait;
use embeddings_client::EmbeddingsClient;

use crate::traits::EmbeddingService;

/// Embedding service over the OpenAI embeddings API.
pub struct OpenAiEmbeddingService {
    client: EmbeddingsClient,
}

impl OpenAiEmbeddingService {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: EmbeddingsClient::new(api_key).with_model(model),
        }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.client.embed(text).await?)
    }
}
