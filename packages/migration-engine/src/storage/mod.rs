mod postgres;

pub use postgres::PostgresStorage;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{
    EmbeddingId, EmbeddingRecord, Mapping, MappingId, MigrationSession, SessionId, SessionStatus,
    SimilarPage, SiteTag, StoredEmbedding,
};

/// Persistence collaborator for sessions, embeddings, and mappings.
///
/// Implementations must be safe for concurrent use; the embed stage calls
/// `insert_embedding` from many workers at once.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_session(&self, owner_id: &str) -> Result<SessionId>;

    async fn update_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<()>;

    /// Errors if the session does not exist.
    async fn get_session(&self, session_id: SessionId) -> Result<MigrationSession>;

    async fn insert_embedding(&self, record: &EmbeddingRecord) -> Result<EmbeddingId>;

    async fn get_embeddings(
        &self,
        session_id: SessionId,
        site: Option<SiteTag>,
    ) -> Result<Vec<StoredEmbedding>>;

    /// Top-k most similar stored embeddings for the given side of the
    /// session, sorted descending by similarity, filtered to
    /// `similarity >= min_similarity`.
    async fn find_similar(
        &self,
        query: &[f32],
        session_id: SessionId,
        site: SiteTag,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SimilarPage>>;

    async fn insert_mapping(&self, mapping: &Mapping) -> Result<MappingId>;

    async fn get_mappings(
        &self,
        session_id: SessionId,
        needs_review: Option<bool>,
    ) -> Result<Vec<Mapping>>;
}
