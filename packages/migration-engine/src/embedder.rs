//! Embedding generation: turn each unmatched page's text into a vector
//! and persist it for the pairing stage.
//!
//! Work is partitioned into fixed-size batches so at most one batch of
//! provider calls is in flight; within a batch pages embed concurrently
//! and the batch joins before the next starts. A page whose embedding
//! fails after all retries is skipped, not fatal; it will surface as an
//! orphan in the pairing stage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::MatcherConfig;
use crate::retry::retry_with_backoff;
use crate::storage::Storage;
use crate::traits::EmbeddingService;
use crate::types::{EmbeddingRecord, Page, SessionId};

/// Counts for one side's embedding pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbedOutcome {
    pub embedded: usize,
    pub skipped: usize,
}

/// Embed and persist vectors for every page, in batches.
///
/// Returns how many pages embedded and how many were skipped after retry
/// exhaustion. Storage write failures are fatal and propagate.
pub async fn embed_pages(
    pages: &[Page],
    session_id: SessionId,
    embeddings: &dyn EmbeddingService,
    storage: &dyn Storage,
    config: &MatcherConfig,
) -> Result<EmbedOutcome> {
    let mut outcome = EmbedOutcome::default();

    for batch in pages.chunks(config.embedding_batch_size) {
        let futures: Vec<_> = batch
            .iter()
            .map(|page| embed_page(page, session_id, embeddings, storage, config))
            .collect();

        for result in join_all(futures).await {
            if result? {
                outcome.embedded += 1;
            } else {
                outcome.skipped += 1;
            }
        }
    }

    info!(
        total = pages.len(),
        embedded = outcome.embedded,
        skipped = outcome.skipped,
        "Embedding pass complete"
    );

    Ok(outcome)
}

/// Embed one page. `Ok(false)` means the provider failed after all
/// retries and the page was skipped.
async fn embed_page(
    page: &Page,
    session_id: SessionId,
    embeddings: &dyn EmbeddingService,
    storage: &dyn Storage,
    config: &MatcherConfig,
) -> Result<bool> {
    let vector = match retry_with_backoff(
        config.embedding_max_retries,
        config.embedding_backoff_base,
        || embeddings.generate(&page.extracted_text),
    )
    .await
    {
        Ok(vector) => vector,
        Err(e) => {
            warn!(
                url = %page.url,
                error = %e,
                "Failed to generate embedding after all retries, skipping page"
            );
            return Ok(false);
        }
    };

    if vector.len() != config.embedding_dimension {
        warn!(
            url = %page.url,
            expected = config.embedding_dimension,
            got = vector.len(),
            "Embedding has wrong dimension, skipping page"
        );
        return Ok(false);
    }

    storage
        .insert_embedding(&EmbeddingRecord {
            session_id,
            url: page.url.clone(),
            site: page.site,
            vector,
            extracted_text: page.extracted_text.clone(),
            title: page.title.clone(),
        })
        .await
        .context("Failed to persist embedding")?;

    debug!(url = %page.url, site = %page.site, "Stored embedding");

    Ok(true)
}
