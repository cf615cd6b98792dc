//! Semantic pairing: match each remaining old page to its most similar
//! new page and decide how much to trust the match.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::MatcherConfig;
use crate::storage::Storage;
use crate::types::{Mapping, MatchType, Page, SessionId, SimilarPage, SiteTag};

/// Scores at or above this are trusted without review regardless of the
/// runner-up.
const SEMANTIC_HIGH_SCORE: f32 = 0.90;

/// Result of the pairing stage.
#[derive(Debug, Default)]
pub struct PairingOutcome {
    pub mappings: Vec<Mapping>,
    /// Old pages with no acceptable match.
    pub orphaned_old: Vec<String>,
    /// New pages never claimed by any old page. Reported, not persisted.
    pub unclaimed_new: Vec<String>,
}

/// Pair each old page against the session's stored new-page embeddings.
///
/// A new page accepted for one mapping is consumed and cannot be chosen
/// again. Old pages without a stored embedding are orphaned with a
/// warning. Accepted mappings are persisted immediately.
pub async fn pair_pages(
    old_pages: &[Page],
    new_pages: &[Page],
    session_id: SessionId,
    storage: &dyn Storage,
    config: &MatcherConfig,
) -> Result<PairingOutcome> {
    let stored = storage
        .get_embeddings(session_id, Some(SiteTag::Old))
        .await
        .context("Failed to load old-page embeddings")?;
    let vectors_by_url: HashMap<String, Vec<f32>> = stored
        .into_iter()
        .map(|e| (e.url, e.vector))
        .collect();

    let mut outcome = PairingOutcome::default();
    let mut consumed: HashSet<String> = HashSet::new();

    for page in old_pages {
        let Some(vector) = vectors_by_url.get(&page.url) else {
            warn!(url = %page.url, "No stored embedding for old page, orphaning");
            outcome.orphaned_old.push(page.url.clone());
            continue;
        };

        let mut candidates = storage
            .find_similar(
                vector,
                session_id,
                SiteTag::New,
                config.similar_page_count,
                0.0,
            )
            .await
            .context("Failed to search similar new pages")?;
        candidates.retain(|c| !consumed.contains(&c.url));

        let Some((best, mapping_kind)) = select_match(&candidates, config) else {
            info!(
                url = %page.url,
                best_score = ?candidates.first().map(|c| c.similarity),
                "Old page orphaned, no candidate above threshold"
            );
            outcome.orphaned_old.push(page.url.clone());
            continue;
        };
        let (match_type, needs_review) = mapping_kind;

        let mapping = Mapping {
            session_id,
            old_url: page.url.clone(),
            new_url: best.url.clone(),
            confidence: best.similarity,
            match_type,
            needs_review,
        };
        storage
            .insert_mapping(&mapping)
            .await
            .context("Failed to persist semantic mapping")?;

        info!(
            old_url = %page.url,
            new_url = %best.url,
            score = best.similarity,
            match_type = %match_type,
            needs_review = needs_review,
            "Matched semantically"
        );

        consumed.insert(best.url.clone());
        outcome.mappings.push(mapping);
    }

    outcome.unclaimed_new = new_pages
        .iter()
        .filter(|p| !consumed.contains(&p.url))
        .map(|p| p.url.clone())
        .collect();

    info!(
        matched = outcome.mappings.len(),
        orphaned = outcome.orphaned_old.len(),
        unclaimed = outcome.unclaimed_new.len(),
        "Pairing complete"
    );

    Ok(outcome)
}

/// Pick the best remaining candidate and classify it, or `None` when the
/// old page should be orphaned.
fn select_match<'a>(
    candidates: &'a [SimilarPage],
    config: &MatcherConfig,
) -> Option<(&'a SimilarPage, (MatchType, bool))> {
    let best = candidates.first()?;
    let second_score = candidates.get(1).map(|c| c.similarity);
    let kind = classify_score(best.similarity, second_score, config)?;
    Some((best, kind))
}

/// Confidence banding. Total over (top score, second score):
///
/// - `>= 0.90`: high, trusted.
/// - `[high_threshold, 0.90)`: medium; flagged for review only when the
///   runner-up is within the ambiguity gap.
/// - `[medium_threshold, high_threshold)`: low, always reviewed.
/// - below `medium_threshold`: rejected (orphan).
///
/// The gap check applies only in the medium band.
fn classify_score(
    top: f32,
    second: Option<f32>,
    config: &MatcherConfig,
) -> Option<(MatchType, bool)> {
    if top < config.medium_confidence_threshold {
        return None;
    }
    if top >= SEMANTIC_HIGH_SCORE {
        return Some((MatchType::SemanticHigh, false));
    }
    if top >= config.high_confidence_threshold {
        let ambiguous = match second {
            Some(second) => (top - second) < config.ambiguity_gap_threshold,
            None => false,
        };
        return Some((MatchType::SemanticMedium, ambiguous));
    }
    Some((MatchType::SemanticLow, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStorage;
    use crate::types::EmbeddingRecord;

    fn config() -> MatcherConfig {
        MatcherConfig {
            embedding_dimension: 3,
            ..MatcherConfig::default()
        }
    }

    #[test]
    fn test_banding_is_total_over_scores() {
        let config = config();

        assert_eq!(
            classify_score(0.95, None, &config),
            Some((MatchType::SemanticHigh, false))
        );
        assert_eq!(
            classify_score(0.85, Some(0.70), &config),
            Some((MatchType::SemanticMedium, false))
        );
        assert_eq!(
            classify_score(0.85, Some(0.82), &config),
            Some((MatchType::SemanticMedium, true))
        );
        assert_eq!(
            classify_score(0.70, None, &config),
            Some((MatchType::SemanticLow, true))
        );
        assert_eq!(classify_score(0.50, None, &config), None);
    }

    #[test]
    fn test_gap_check_only_in_medium_band() {
        let config = config();

        // Near-tie at high confidence is still trusted.
        assert_eq!(
            classify_score(0.95, Some(0.94), &config),
            Some((MatchType::SemanticHigh, false))
        );
        // Low band is reviewed regardless of gap.
        assert_eq!(
            classify_score(0.75, Some(0.40), &config),
            Some((MatchType::SemanticLow, true))
        );
    }

    async fn seed(storage: &MemoryStorage, session_id: SessionId, url: &str, site: SiteTag, vector: Vec<f32>) {
        storage
            .insert_embedding(&EmbeddingRecord {
                session_id,
                url: url.to_string(),
                site,
                vector,
                extracted_text: String::new(),
                title: String::new(),
            })
            .await
            .unwrap();
    }

    fn page(url: &str, site: SiteTag) -> Page {
        Page::new(
            url.to_string(),
            site,
            "<html><body><p>Enough body text to build a page.</p></body></html>".to_string(),
        )
    }

    #[tokio::test]
    async fn test_pairs_best_candidate_and_reports_unclaimed() {
        let storage = MemoryStorage::new();
        let session_id = storage.create_session("test").await.unwrap();

        seed(&storage, session_id, "http://old.com/food", SiteTag::Old, vec![1.0, 0.0, 0.0]).await;
        // Nearly parallel to the old page: high similarity.
        seed(&storage, session_id, "http://new.com/food-shelf", SiteTag::New, vec![0.99, 0.05, 0.0]).await;
        // Orthogonal: never claimed.
        seed(&storage, session_id, "http://new.com/donate", SiteTag::New, vec![0.0, 0.0, 1.0]).await;

        let old = [page("http://old.com/food", SiteTag::Old)];
        let new = [
            page("http://new.com/food-shelf", SiteTag::New),
            page("http://new.com/donate", SiteTag::New),
        ];

        let outcome = pair_pages(&old, &new, session_id, &storage, &config())
            .await
            .unwrap();

        assert_eq!(outcome.mappings.len(), 1);
        assert_eq!(outcome.mappings[0].new_url, "http://new.com/food-shelf");
        assert_eq!(outcome.mappings[0].match_type, MatchType::SemanticHigh);
        assert!(outcome.orphaned_old.is_empty());
        assert_eq!(outcome.unclaimed_new, vec!["http://new.com/donate"]);

        let stored = storage.get_mappings(session_id, None).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_dissimilar_old_page_is_orphaned() {
        let storage = MemoryStorage::new();
        let session_id = storage.create_session("test").await.unwrap();

        seed(&storage, session_id, "http://old.com/welcome", SiteTag::Old, vec![1.0, 0.0, 0.0]).await;
        // Low similarity (~0.40 after normalization).
        seed(&storage, session_id, "http://new.com/unrelated", SiteTag::New, vec![0.4, 0.9165, 0.0]).await;

        let old = [page("http://old.com/welcome", SiteTag::Old)];
        let new = [page("http://new.com/unrelated", SiteTag::New)];

        let outcome = pair_pages(&old, &new, session_id, &storage, &config())
            .await
            .unwrap();

        assert!(outcome.mappings.is_empty());
        assert_eq!(outcome.orphaned_old, vec!["http://old.com/welcome"]);
        assert_eq!(outcome.unclaimed_new, vec!["http://new.com/unrelated"]);
    }

    #[tokio::test]
    async fn test_consumed_new_page_cannot_be_chosen_twice() {
        let storage = MemoryStorage::new();
        let session_id = storage.create_session("test").await.unwrap();

        // Two old pages pointing at the same best new page.
        seed(&storage, session_id, "http://old.com/a", SiteTag::Old, vec![1.0, 0.0, 0.0]).await;
        seed(&storage, session_id, "http://old.com/b", SiteTag::Old, vec![0.98, 0.1, 0.0]).await;
        seed(&storage, session_id, "http://new.com/target", SiteTag::New, vec![1.0, 0.0, 0.0]).await;
        seed(&storage, session_id, "http://new.com/second", SiteTag::New, vec![0.95, 0.2, 0.0]).await;

        let old = [
            page("http://old.com/a", SiteTag::Old),
            page("http://old.com/b", SiteTag::Old),
        ];
        let new = [
            page("http://new.com/target", SiteTag::New),
            page("http://new.com/second", SiteTag::New),
        ];

        let outcome = pair_pages(&old, &new, session_id, &storage, &config())
            .await
            .unwrap();

        assert_eq!(outcome.mappings.len(), 2);
        assert_eq!(outcome.mappings[0].new_url, "http://new.com/target");
        assert_eq!(outcome.mappings[1].new_url, "http://new.com/second");

        let targets: HashSet<_> = outcome.mappings.iter().map(|m| &m.new_url).collect();
        assert_eq!(targets.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_embedding_orphans_with_no_query() {
        let storage = MemoryStorage::new();
        let session_id = storage.create_session("test").await.unwrap();

        seed(&storage, session_id, "http://new.com/a", SiteTag::New, vec![1.0, 0.0, 0.0]).await;

        // Old page never got an embedding (e.g. retries exhausted).
        let old = [page("http://old.com/no-vector", SiteTag::Old)];
        let new = [page("http://new.com/a", SiteTag::New)];

        let outcome = pair_pages(&old, &new, session_id, &storage, &config())
            .await
            .unwrap();

        assert!(outcome.mappings.is_empty());
        assert_eq!(outcome.orphaned_old, vec!["http://old.com/no-vector"]);
        assert_eq!(storage.find_similar_calls(), 0);
    }
}
