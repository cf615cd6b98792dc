//! Content-digest matching: a page whose raw HTML is byte-identical on
//! both sites moved without changing, so it maps with full confidence.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::storage::Storage;
use crate::types::{ContentHash, Mapping, MatchType, Page, SessionId};

/// Match pages with identical content digests.
///
/// Pages shorter than `min_html_length` are excluded from hashing; an
/// empty or placeholder body on both sides must not produce a match.
/// Each digest on the new side is consumed by at most one old page
/// (first match wins). Matches are persisted immediately as `exact_html`.
pub async fn match_exact_content(
    old_pages: &[Page],
    new_pages: &[Page],
    min_html_length: usize,
    session_id: SessionId,
    storage: &dyn Storage,
) -> Result<Vec<Mapping>> {
    let mut new_by_hash: HashMap<&ContentHash, &Page> = HashMap::new();
    for page in new_pages {
        if page.html.len() < min_html_length {
            debug!(url = %page.url, length = page.html.len(), "Skipping short page for hashing");
            continue;
        }
        // First entry wins on digest collisions.
        new_by_hash.entry(&page.content_hash).or_insert(page);
    }

    let mut mappings = Vec::new();
    let mut consumed: HashSet<&ContentHash> = HashSet::new();

    for page in old_pages {
        if page.html.len() < min_html_length {
            debug!(url = %page.url, length = page.html.len(), "Skipping short page for hashing");
            continue;
        }
        let Some(new_page) = new_by_hash.get(&page.content_hash) else {
            continue;
        };
        if !consumed.insert(&page.content_hash) {
            continue;
        }

        let mapping = Mapping::exact(
            session_id,
            page.url.clone(),
            new_page.url.clone(),
            MatchType::ExactHtml,
        );
        storage
            .insert_mapping(&mapping)
            .await
            .context("Failed to persist exact content mapping")?;

        info!(
            old_url = %page.url,
            new_url = %new_page.url,
            content_hash = %page.content_hash.to_hex(),
            "Matched by identical content"
        );

        mappings.push(mapping);
    }

    info!(matched = mappings.len(), "Content matching complete");

    Ok(mappings)
}
