//! Exact path matching: an old URL whose domain-stripped path exists
//! verbatim on the new site maps with full confidence, before any fetch
//! is spent on either side.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tracing::info;

use crate::classifier::url_path;
use crate::storage::Storage;
use crate::types::{Mapping, MatchType, SessionId};

/// Result of the path-matching stage.
#[derive(Debug)]
pub struct PathMatchOutcome {
    /// Old URLs still unmatched, input order preserved.
    pub old_remaining: Vec<String>,
    /// New URLs still unmatched, input order preserved.
    pub new_remaining: Vec<String>,
    pub mappings: Vec<Mapping>,
}

/// Match URLs whose paths are byte-identical across both sites.
///
/// Each match is persisted immediately as `exact_url` with confidence 1.0
/// and both URLs are removed from the remaining pools. A duplicated path
/// on either side matches at most once.
pub async fn match_exact_paths(
    old_urls: Vec<String>,
    new_urls: Vec<String>,
    session_id: SessionId,
    storage: &dyn Storage,
) -> Result<PathMatchOutcome> {
    let mut new_by_path: HashMap<String, &String> = HashMap::new();
    for url in &new_urls {
        // First occurrence wins when two new URLs share a path.
        new_by_path.entry(url_path(url)).or_insert(url);
    }

    let mut mappings = Vec::new();
    let mut matched_old: HashSet<&String> = HashSet::new();
    let mut matched_new: HashSet<String> = HashSet::new();

    for old_url in &old_urls {
        let path = url_path(old_url);
        let Some(new_url) = new_by_path.get(&path) else {
            continue;
        };
        if matched_new.contains(new_url.as_str()) {
            continue;
        }

        let mapping = Mapping::exact(
            session_id,
            old_url.clone(),
            (*new_url).clone(),
            MatchType::ExactUrl,
        );
        storage
            .insert_mapping(&mapping)
            .await
            .context("Failed to persist exact path mapping")?;

        info!(
            old_url = %old_url,
            new_url = %new_url,
            path = %path,
            "Matched by exact path"
        );

        matched_old.insert(old_url);
        matched_new.insert((*new_url).clone());
        mappings.push(mapping);
    }

    let old_remaining = old_urls
        .iter()
        .filter(|url| !matched_old.contains(url))
        .cloned()
        .collect();
    let new_remaining = new_urls
        .iter()
        .filter(|url| !matched_new.contains(url.as_str()))
        .cloned()
        .collect();

    info!(
        matched = mappings.len(),
        "Exact path matching complete"
    );

    Ok(PathMatchOutcome {
        old_remaining,
        new_remaining,
        mappings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStorage;

    #[tokio::test]
    async fn test_matches_identical_paths_across_domains() {
        let storage = MemoryStorage::new();
        let session_id = storage.create_session("test").await.unwrap();

        let outcome = match_exact_paths(
            vec![
                "http://a.com/x.html".to_string(),
                "http://a.com/only-old".to_string(),
            ],
            vec![
                "http://b.com/x.html".to_string(),
                "http://b.com/only-new".to_string(),
            ],
            session_id,
            &storage,
        )
        .await
        .unwrap();

        assert_eq!(outcome.mappings.len(), 1);
        let mapping = &outcome.mappings[0];
        assert_eq!(mapping.old_url, "http://a.com/x.html");
        assert_eq!(mapping.new_url, "http://b.com/x.html");
        assert_eq!(mapping.confidence, 1.0);
        assert_eq!(mapping.match_type, MatchType::ExactUrl);
        assert!(!mapping.needs_review);

        assert_eq!(outcome.old_remaining, vec!["http://a.com/only-old"]);
        assert_eq!(outcome.new_remaining, vec!["http://b.com/only-new"]);

        // Persisted immediately
        let stored = storage.get_mappings(session_id, None).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_new_url_consumed_at_most_once() {
        let storage = MemoryStorage::new();
        let session_id = storage.create_session("test").await.unwrap();

        // Two new URLs (apex and subdomain) collapse to the same path.
        let outcome = match_exact_paths(
            vec!["http://a.com/about".to_string()],
            vec![
                "http://b.com/about".to_string(),
                "http://c.b.com/about".to_string(),
            ],
            session_id,
            &storage,
        )
        .await
        .unwrap();

        assert_eq!(outcome.mappings.len(), 1);
        assert_eq!(outcome.mappings[0].new_url, "http://b.com/about");
        assert_eq!(outcome.new_remaining, vec!["http://c.b.com/about"]);
    }

    #[tokio::test]
    async fn test_no_matches_leaves_lists_untouched() {
        let storage = MemoryStorage::new();
        let session_id = storage.create_session("test").await.unwrap();

        let old = vec!["http://a.com/one".to_string()];
        let new = vec!["http://b.com/two".to_string()];

        let outcome = match_exact_paths(old.clone(), new.clone(), session_id, &storage)
            .await
            .unwrap();

        assert!(outcome.mappings.is_empty());
        assert_eq!(outcome.old_remaining, old);
        assert_eq!(outcome.new_remaining, new);
    }
}
