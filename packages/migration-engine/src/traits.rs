// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. Matching
// policy lives in the stage functions that consume them.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// May fail transiently; callers own the retry policy.
    async fn generate(&self, text: &str) -> Result<Vec<f32>>;
}
