use anyhow::{Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{PgPool, Row};

use super::Storage;
use crate::types::{
    EmbeddingId, EmbeddingRecord, Mapping, MappingId, MatchType, MigrationSession, SessionId,
    SessionStatus, SimilarPage, SiteTag, StoredEmbedding,
};

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn create_session(&self, owner_id: &str) -> Result<SessionId> {
        let id = SessionId::new();
        sqlx::query(
            r#"
            INSERT INTO migration_sessions (id, owner_id, status, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(id.0)
        .bind(owner_id)
        .bind(SessionStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to create migration session")?;
        Ok(id)
    }

    async fn update_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE migration_sessions SET status = $2 WHERE id = $1")
            .bind(session_id.0)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to update session status")?;
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<MigrationSession> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, status, created_at
            FROM migration_sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get migration session")?;

        let row = row.ok_or_else(|| anyhow::anyhow!("Session {} not found", session_id))?;

        let status: String = row.get("status");
        Ok(MigrationSession {
            id: SessionId(row.get("id")),
            owner_id: row.get("owner_id"),
            status: SessionStatus::parse(&status)
                .ok_or_else(|| anyhow::anyhow!("Unknown session status: {}", status))?,
            created_at: row.get("created_at"),
        })
    }

    async fn insert_embedding(&self, record: &EmbeddingRecord) -> Result<EmbeddingId> {
        let id = EmbeddingId::new();
        sqlx::query(
            r#"
            INSERT INTO webpage_embeddings (
                id, session_id, url, site_tag, embedding, extracted_text, title
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id.0)
        .bind(record.session_id.0)
        .bind(&record.url)
        .bind(record.site.as_str())
        .bind(Vector::from(record.vector.clone()))
        .bind(&record.extracted_text)
        .bind(&record.title)
        .execute(&self.pool)
        .await
        .context("Failed to insert embedding")?;
        Ok(id)
    }

    async fn get_embeddings(
        &self,
        session_id: SessionId,
        site: Option<SiteTag>,
    ) -> Result<Vec<StoredEmbedding>> {
        let rows = match site {
            Some(site) => {
                sqlx::query(
                    r#"
                    SELECT url, embedding
                    FROM webpage_embeddings
                    WHERE session_id = $1 AND site_tag = $2
                    "#,
                )
                .bind(session_id.0)
                .bind(site.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT url, embedding
                    FROM webpage_embeddings
                    WHERE session_id = $1
                    "#,
                )
                .bind(session_id.0)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to get embeddings")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let vector: Vector = row.get("embedding");
                StoredEmbedding {
                    url: row.get("url"),
                    vector: vector.to_vec(),
                }
            })
            .collect())
    }

    async fn find_similar(
        &self,
        query: &[f32],
        session_id: SessionId,
        site: SiteTag,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SimilarPage>> {
        let rows = sqlx::query(
            r#"
            SELECT
                url,
                1 - (embedding <=> $1) AS similarity
            FROM webpage_embeddings
            WHERE session_id = $2
              AND site_tag = $3
              AND 1 - (embedding <=> $1) >= $4
            ORDER BY similarity DESC
            LIMIT $5
            "#,
        )
        .bind(Vector::from(query.to_vec()))
        .bind(session_id.0)
        .bind(site.as_str())
        .bind(min_similarity as f64)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search similar embeddings")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let similarity: f64 = row.get("similarity");
                SimilarPage {
                    url: row.get("url"),
                    similarity: similarity as f32,
                }
            })
            .collect())
    }

    async fn insert_mapping(&self, mapping: &Mapping) -> Result<MappingId> {
        let id = MappingId::new();
        sqlx::query(
            r#"
            INSERT INTO url_mappings (
                id, session_id, old_url, new_url, confidence_score, match_type, needs_review
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id.0)
        .bind(mapping.session_id.0)
        .bind(&mapping.old_url)
        .bind(&mapping.new_url)
        .bind(mapping.confidence)
        .bind(mapping.match_type.as_str())
        .bind(mapping.needs_review)
        .execute(&self.pool)
        .await
        .context("Failed to insert mapping")?;
        Ok(id)
    }

    async fn get_mappings(
        &self,
        session_id: SessionId,
        needs_review: Option<bool>,
    ) -> Result<Vec<Mapping>> {
        let rows = match needs_review {
            Some(needs_review) => {
                sqlx::query(
                    r#"
                    SELECT session_id, old_url, new_url, confidence_score, match_type, needs_review
                    FROM url_mappings
                    WHERE session_id = $1 AND needs_review = $2
                    "#,
                )
                .bind(session_id.0)
                .bind(needs_review)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT session_id, old_url, new_url, confidence_score, match_type, needs_review
                    FROM url_mappings
                    WHERE session_id = $1
                    "#,
                )
                .bind(session_id.0)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to get mappings")?;

        rows.into_iter()
            .map(|row| {
                let match_type: String = row.get("match_type");
                Ok(Mapping {
                    session_id: SessionId(row.get("session_id")),
                    old_url: row.get("old_url"),
                    new_url: row.get("new_url"),
                    confidence: row.get::<f32, _>("confidence_score"),
                    match_type: MatchType::parse(&match_type)
                        .ok_or_else(|| anyhow::anyhow!("Unknown match type: {}", match_type))?,
                    needs_review: row.get("needs_review"),
                })
            })
            .collect()
    }
}
