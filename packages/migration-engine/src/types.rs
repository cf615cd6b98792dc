use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::extract;

/// Unique identifier for a migration session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a stored embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingId(pub Uuid);

impl EmbeddingId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EmbeddingId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a url mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingId(pub Uuid);

impl MappingId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MappingId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which side of the migration a URL or page belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteTag {
    Old,
    New,
}

impl SiteTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteTag::Old => "old",
            SiteTag::New => "new",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "old" => Some(SiteTag::Old),
            "new" => Some(SiteTag::New),
            _ => None,
        }
    }
}

impl std::fmt::Display for SiteTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content digest used for exact-content matching.
///
/// Hashes the raw bytes without normalization: for redirect purposes a
/// whitespace edit is a real content change, so byte-identical means
/// byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub Vec<u8>);

impl ContentHash {
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hasher.finalize().to_vec())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// A fetched page with its derived values.
///
/// Text, title, and digest are computed once at construction and never
/// change afterwards.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub site: SiteTag,
    pub html: String,
    pub extracted_text: String,
    pub title: String,
    pub content_hash: ContentHash,
}

impl Page {
    pub fn new(url: String, site: SiteTag, html: String) -> Self {
        let extracted_text = extract::extract_text(&html, &url);
        let title = extract::extract_title(&html);
        let content_hash = ContentHash::from_content(&html);
        Self {
            url,
            site,
            html,
            extracted_text,
            title,
            content_hash,
        }
    }

    /// A page whose fetch failed; carries no content and never hash-matches
    /// (the content matcher drops it on the minimum-length check).
    pub fn empty(url: String, site: SiteTag) -> Self {
        Self::new(url, site, String::new())
    }
}

/// How a mapping was found, in descending order of trust
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactUrl,
    ExactHtml,
    SemanticHigh,
    SemanticMedium,
    SemanticLow,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactUrl => "exact_url",
            MatchType::ExactHtml => "exact_html",
            MatchType::SemanticHigh => "semantic_high",
            MatchType::SemanticMedium => "semantic_medium",
            MatchType::SemanticLow => "semantic_low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact_url" => Some(MatchType::ExactUrl),
            "exact_html" => Some(MatchType::ExactHtml),
            "semantic_high" => Some(MatchType::SemanticHigh),
            "semantic_medium" => Some(MatchType::SemanticMedium),
            "semantic_low" => Some(MatchType::SemanticLow),
            _ => None,
        }
    }

    /// Exact matches carry a fixed confidence of 1.0.
    pub fn is_exact(&self) -> bool {
        matches!(self, MatchType::ExactUrl | MatchType::ExactHtml)
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A redirect candidate from an old URL to a new URL.
///
/// Identity within a run is the (old_url, new_url) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    pub session_id: SessionId,
    pub old_url: String,
    pub new_url: String,
    pub confidence: f32,
    pub match_type: MatchType,
    pub needs_review: bool,
}

impl Mapping {
    /// Mapping found by path or content-digest equality.
    pub fn exact(
        session_id: SessionId,
        old_url: String,
        new_url: String,
        match_type: MatchType,
    ) -> Self {
        debug_assert!(match_type.is_exact());
        Self {
            session_id,
            old_url,
            new_url,
            confidence: 1.0,
            match_type,
            needs_review: false,
        }
    }
}

/// An embedding ready for persistence
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub session_id: SessionId,
    pub url: String,
    pub site: SiteTag,
    pub vector: Vec<f32>,
    pub extracted_text: String,
    pub title: String,
}

/// An embedding loaded back from storage
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub url: String,
    pub vector: Vec<f32>,
}

/// A nearest-neighbor candidate returned by similarity search
#[derive(Debug, Clone)]
pub struct SimilarPage {
    pub url: String,
    pub similarity: f32,
}

/// Lifecycle status of a migration session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SessionStatus::Pending),
            "processing" => Some(SessionStatus::Processing),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// One migration run; groups all pages, embeddings, and mappings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSession {
    pub id: SessionId,
    pub owner_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}
