//! The matching pipeline: a fixed sequence of progressively more
//! expensive strategies, each excluding already-matched pages from the
//! stages after it.
//!
//! Stage order: classify URLs, match exact paths, fetch HTML, match
//! content digests, embed the rest, pair semantically. Stages run
//! strictly one after another; concurrency lives inside the fetch and
//! embed stages only.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::classifier::classify_urls;
use crate::config::MatcherConfig;
use crate::content_matcher::match_exact_content;
use crate::embedder::embed_pages;
use crate::error::PipelineError;
use crate::fetcher::{scrape_pages, PageFetcher};
use crate::pairer::pair_pages;
use crate::path_matcher::match_exact_paths;
use crate::report::{MappingStats, MigrationReport};
use crate::storage::Storage;
use crate::traits::EmbeddingService;
use crate::types::{Mapping, SessionId, SessionStatus, SiteTag};

pub struct MigrationPipeline {
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn PageFetcher>,
    embeddings: Arc<dyn EmbeddingService>,
    config: MatcherConfig,
}

impl MigrationPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        fetcher: Arc<dyn PageFetcher>,
        embeddings: Arc<dyn EmbeddingService>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            storage,
            fetcher,
            embeddings,
            config,
        }
    }

    /// Run the full pipeline over both URL sets.
    ///
    /// Per-page fetch and embedding failures are absorbed inside their
    /// stages; an error out of here means configuration, input, or the
    /// storage collaborator, and the session is marked failed.
    pub async fn run(
        &self,
        old_urls: Vec<String>,
        new_urls: Vec<String>,
        owner_id: &str,
    ) -> std::result::Result<MigrationReport, PipelineError> {
        self.config
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if old_urls.is_empty() {
            return Err(PipelineError::Validation(
                "old URL list is empty".to_string(),
            ));
        }
        if new_urls.is_empty() {
            return Err(PipelineError::Validation(
                "new URL list is empty".to_string(),
            ));
        }

        let session_id = self
            .storage
            .create_session(owner_id)
            .await
            .map_err(PipelineError::Persistence)?;
        self.storage
            .update_session_status(session_id, SessionStatus::Processing)
            .await
            .map_err(PipelineError::Persistence)?;

        info!(
            session_id = %session_id,
            old_urls = old_urls.len(),
            new_urls = new_urls.len(),
            "Starting migration run"
        );

        match self.execute(session_id, old_urls, new_urls).await {
            Ok(report) => {
                self.storage
                    .update_session_status(session_id, SessionStatus::Completed)
                    .await
                    .map_err(PipelineError::Persistence)?;
                info!(
                    session_id = %session_id,
                    mappings = report.mappings.len(),
                    orphaned = report.orphaned_old.len(),
                    "Migration run completed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Migration run failed");
                if let Err(status_err) = self
                    .storage
                    .update_session_status(session_id, SessionStatus::Failed)
                    .await
                {
                    warn!(
                        session_id = %session_id,
                        error = %status_err,
                        "Failed to mark session as failed"
                    );
                }
                Err(PipelineError::Persistence(e))
            }
        }
    }

    async fn execute(
        &self,
        session_id: SessionId,
        old_urls: Vec<String>,
        new_urls: Vec<String>,
    ) -> Result<MigrationReport> {
        // Stage 1: drop asset and (optionally) blog-post URLs.
        let (old_urls, new_urls) = classify_urls(old_urls, new_urls, &self.config);
        info!(
            old_urls = old_urls.len(),
            new_urls = new_urls.len(),
            "URL classification complete"
        );

        // Stage 2: exact path matches, before any fetch is spent.
        let path_outcome =
            match_exact_paths(old_urls, new_urls, session_id, self.storage.as_ref()).await?;

        // Stage 3: fetch both sides concurrently.
        let (old_pages, new_pages) = tokio::join!(
            scrape_pages(&path_outcome.old_remaining, SiteTag::Old, self.fetcher.as_ref()),
            scrape_pages(&path_outcome.new_remaining, SiteTag::New, self.fetcher.as_ref()),
        );

        // Stage 4: identical content digests.
        let content_mappings = match_exact_content(
            &old_pages,
            &new_pages,
            self.config.min_html_length,
            session_id,
            self.storage.as_ref(),
        )
        .await?;

        let matched_old: HashSet<&str> = content_mappings
            .iter()
            .map(|m| m.old_url.as_str())
            .collect();
        let matched_new: HashSet<&str> = content_mappings
            .iter()
            .map(|m| m.new_url.as_str())
            .collect();

        let old_unmatched: Vec<_> = old_pages
            .iter()
            .filter(|p| !matched_old.contains(p.url.as_str()))
            .cloned()
            .collect();
        let new_unmatched: Vec<_> = new_pages
            .iter()
            .filter(|p| !matched_new.contains(p.url.as_str()))
            .cloned()
            .collect();

        // Stage 5: embed what is still unmatched, old then new.
        let old_embed = embed_pages(
            &old_unmatched,
            session_id,
            self.embeddings.as_ref(),
            self.storage.as_ref(),
            &self.config,
        )
        .await
        .context("Embedding old pages failed")?;
        let new_embed = embed_pages(
            &new_unmatched,
            session_id,
            self.embeddings.as_ref(),
            self.storage.as_ref(),
            &self.config,
        )
        .await
        .context("Embedding new pages failed")?;

        // Stage 6: semantic pairing over the stored vectors.
        let pairing = pair_pages(
            &old_unmatched,
            &new_unmatched,
            session_id,
            self.storage.as_ref(),
            &self.config,
        )
        .await?;

        let mut mappings: Vec<Mapping> = path_outcome.mappings;
        mappings.extend(content_mappings);
        mappings.extend(pairing.mappings);

        let stats = MappingStats::from_mappings(&mappings);

        Ok(MigrationReport {
            session_id,
            mappings,
            orphaned_old: pairing.orphaned_old,
            unclaimed_new: pairing.unclaimed_new,
            pages_skipped_embedding: old_embed.skipped + new_embed.skipped,
            stats,
        })
    }
}
