//! Run summary handed back to callers: the accepted mappings plus the
//! aggregate numbers a reviewer wants first.

use serde::Serialize;

use crate::types::{Mapping, MatchType, SessionId};

/// Everything a run produced.
#[derive(Debug, Serialize)]
pub struct MigrationReport {
    pub session_id: SessionId,
    pub mappings: Vec<Mapping>,
    /// Old URLs with no mapping above the minimum threshold.
    pub orphaned_old: Vec<String>,
    /// New URLs never claimed by any old page.
    pub unclaimed_new: Vec<String>,
    /// Pages whose embedding failed after all retries.
    pub pages_skipped_embedding: usize,
    pub stats: MappingStats,
}

/// Aggregate counts over a run's mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingStats {
    pub total: usize,
    pub exact: usize,
    pub semantic_high: usize,
    pub semantic_medium: usize,
    pub semantic_low: usize,
    pub needs_review: usize,
    /// Percentage of mappings not flagged for review, rounded.
    pub approval_progress: u32,
}

impl MappingStats {
    pub fn from_mappings(mappings: &[Mapping]) -> Self {
        let mut stats = Self {
            total: mappings.len(),
            ..Self::default()
        };

        for mapping in mappings {
            match mapping.match_type {
                MatchType::ExactUrl | MatchType::ExactHtml => stats.exact += 1,
                MatchType::SemanticHigh => stats.semantic_high += 1,
                MatchType::SemanticMedium => stats.semantic_medium += 1,
                MatchType::SemanticLow => stats.semantic_low += 1,
            }
            if mapping.needs_review {
                stats.needs_review += 1;
            }
        }

        if stats.total > 0 {
            let approved = stats.total - stats.needs_review;
            stats.approval_progress =
                ((approved as f64 / stats.total as f64) * 100.0).round() as u32;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(match_type: MatchType, needs_review: bool) -> Mapping {
        Mapping {
            session_id: SessionId::new(),
            old_url: "http://old.com/a".to_string(),
            new_url: "http://new.com/a".to_string(),
            confidence: if match_type.is_exact() { 1.0 } else { 0.8 },
            match_type,
            needs_review,
        }
    }

    #[test]
    fn test_stats_partition_totals() {
        let mappings = vec![
            mapping(MatchType::ExactUrl, false),
            mapping(MatchType::ExactHtml, false),
            mapping(MatchType::SemanticHigh, false),
            mapping(MatchType::SemanticMedium, true),
            mapping(MatchType::SemanticLow, true),
        ];

        let stats = MappingStats::from_mappings(&mappings);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.exact, 2);
        assert_eq!(stats.semantic_high, 1);
        assert_eq!(stats.semantic_medium, 1);
        assert_eq!(stats.semantic_low, 1);
        assert_eq!(stats.needs_review, 2);
        assert_eq!(stats.approval_progress, 60);
    }

    #[test]
    fn test_empty_mappings_yield_zeroes() {
        let stats = MappingStats::from_mappings(&[]);
        assert_eq!(stats, MappingStats::default());
    }
}
