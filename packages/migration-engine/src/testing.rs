//! In-memory collaborator implementations for tests.
//!
//! `MemoryStorage` implements real vector search (cosine similarity over
//! stored embeddings) so pipeline tests exercise the same ranking the
//! Postgres implementation delegates to pgvector.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::fetcher::{FetchedPage, PageFetcher};
use crate::storage::Storage;
use crate::traits::EmbeddingService;
use crate::types::{
    EmbeddingId, EmbeddingRecord, Mapping, MappingId, MigrationSession, SessionId, SessionStatus,
    SimilarPage, SiteTag, StoredEmbedding,
};

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + 1e-12)
}

// =============================================================================
// Memory Storage
// =============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    sessions: Mutex<HashMap<SessionId, MigrationSession>>,
    embeddings: Mutex<Vec<EmbeddingRecord>>,
    mappings: Mutex<Vec<Mapping>>,
    find_similar_calls: AtomicUsize,
    fail_mapping_inserts: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `insert_mapping` fail, to simulate a rejected write
    /// mid-run.
    pub fn with_failing_mapping_inserts(self) -> Self {
        self.fail_mapping_inserts.store(true, Ordering::SeqCst);
        self
    }

    /// How many similarity searches have been issued.
    pub fn find_similar_calls(&self) -> usize {
        self.find_similar_calls.load(Ordering::SeqCst)
    }

    /// All sessions created so far.
    pub fn sessions(&self) -> Vec<MigrationSession> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_session(&self, owner_id: &str) -> Result<SessionId> {
        let session = MigrationSession {
            id: SessionId::new(),
            owner_id: owner_id.to_string(),
            status: SessionStatus::Pending,
            created_at: Utc::now(),
        };
        let id = session.id;
        self.sessions.lock().unwrap().insert(id, session);
        Ok(id)
    }

    async fn update_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| anyhow::anyhow!("Session {} not found", session_id))?;
        session.status = status;
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<MigrationSession> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Session {} not found", session_id))
    }

    async fn insert_embedding(&self, record: &EmbeddingRecord) -> Result<EmbeddingId> {
        self.embeddings.lock().unwrap().push(record.clone());
        Ok(EmbeddingId::new())
    }

    async fn get_embeddings(
        &self,
        session_id: SessionId,
        site: Option<SiteTag>,
    ) -> Result<Vec<StoredEmbedding>> {
        Ok(self
            .embeddings
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.session_id == session_id && site.map_or(true, |s| e.site == s))
            .map(|e| StoredEmbedding {
                url: e.url.clone(),
                vector: e.vector.clone(),
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
        self.find_similar_calls.fetch_add(1, Ordering::SeqCst);

        let mut results: Vec<SimilarPage> = self
            .embeddings
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.session_id == session_id && e.site == site)
            .map(|e| SimilarPage {
                url: e.url.clone(),
                similarity: cosine_similarity(query, &e.vector),
            })
            .filter(|s| s.similarity >= min_similarity)
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);
        Ok(results)
    }

    async fn insert_mapping(&self, mapping: &Mapping) -> Result<MappingId> {
        if self.fail_mapping_inserts.load(Ordering::SeqCst) {
            anyhow::bail!("mapping write rejected");
        }
        self.mappings.lock().unwrap().push(mapping.clone());
        Ok(MappingId::new())
    }

    async fn get_mappings(
        &self,
        session_id: SessionId,
        needs_review: Option<bool>,
    ) -> Result<Vec<Mapping>> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.session_id == session_id && needs_review.map_or(true, |r| m.needs_review == r)
            })
            .cloned()
            .collect())
    }
}

// =============================================================================
// Failing Storage
// =============================================================================

/// Storage double whose every operation fails; for persistence-fatality
/// tests.
#[derive(Default)]
pub struct FailingStorage;

impl FailingStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn create_session(&self, _owner_id: &str) -> Result<SessionId> {
        anyhow::bail!("storage unavailable")
    }

    async fn update_session_status(
        &self,
        _session_id: SessionId,
        _status: SessionStatus,
    ) -> Result<()> {
        anyhow::bail!("storage unavailable")
    }

    async fn get_session(&self, _session_id: SessionId) -> Result<MigrationSession> {
        anyhow::bail!("storage unavailable")
    }

    async fn insert_embedding(&self, _record: &EmbeddingRecord) -> Result<EmbeddingId> {
        anyhow::bail!("storage unavailable")
    }

    async fn get_embeddings(
        &self,
        _session_id: SessionId,
        _site: Option<SiteTag>,
    ) -> Result<Vec<StoredEmbedding>> {
        anyhow::bail!("storage unavailable")
    }

    async fn find_similar(
        &self,
        _query: &[f32],
        _session_id: SessionId,
        _site: SiteTag,
        _k: usize,
        _min_similarity: f32,
    ) -> Result<Vec<SimilarPage>> {
        anyhow::bail!("storage unavailable")
    }

    async fn insert_mapping(&self, _mapping: &Mapping) -> Result<MappingId> {
        anyhow::bail!("storage unavailable")
    }

    async fn get_mappings(
        &self,
        _session_id: SessionId,
        _needs_review: Option<bool>,
    ) -> Result<Vec<Mapping>> {
        anyhow::bail!("storage unavailable")
    }
}

// =============================================================================
// Mock Fetcher
// =============================================================================

enum MockResponse {
    Body(String),
    Status(u16),
    Error,
}

/// Fetch double with canned responses and call recording.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, MockResponse>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this body with a 200 for the given URL.
    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), MockResponse::Body(body.to_string()));
        self
    }

    /// Serve an empty body with the given status for the URL.
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), MockResponse::Status(status));
        self
    }

    /// Fail the request outright for the URL.
    pub fn with_error(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), MockResponse::Error);
        self
    }

    /// All URLs fetched, in call order.
    pub fn fetch_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_fetched(&self, url: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|u| u == url)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.calls.lock().unwrap().push(url.to_string());

        match self.responses.get(url) {
            Some(MockResponse::Body(body)) => Ok(FetchedPage {
                status: 200,
                body: body.clone(),
            }),
            Some(MockResponse::Status(status)) => Ok(FetchedPage {
                status: *status,
                body: String::new(),
            }),
            Some(MockResponse::Error) => anyhow::bail!("connection refused"),
            None => anyhow::bail!("no mock response for {}", url),
        }
    }
}

// =============================================================================
// Mock Embedding Services
// =============================================================================

/// Embedding double returning canned vectors.
///
/// Overrides match on a substring of the embedded text; the default
/// vector covers everything else.
pub struct MockEmbeddingService {
    default_vector: Vec<f32>,
    overrides: Vec<(String, Vec<f32>)>,
    calls: AtomicUsize,
}

impl MockEmbeddingService {
    pub fn new(default_vector: Vec<f32>) -> Self {
        Self {
            default_vector,
            overrides: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Return `vector` for any text containing `text_fragment`.
    pub fn with_vector(mut self, text_fragment: &str, vector: Vec<f32>) -> Self {
        self.overrides.push((text_fragment.to_string(), vector));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        for (fragment, vector) in &self.overrides {
            if text.contains(fragment.as_str()) {
                return Ok(vector.clone());
            }
        }
        Ok(self.default_vector.clone())
    }
}

/// Embedding double that fails a fixed number of times before
/// succeeding; for retry tests.
pub struct FlakyEmbeddingService {
    vector: Vec<f32>,
    failures_before_success: usize,
    calls: AtomicUsize,
}

impl FlakyEmbeddingService {
    pub fn new(vector: Vec<f32>, failures_before_success: usize) -> Self {
        Self {
            vector,
            failures_before_success,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for FlakyEmbeddingService {
    async fn generate(&self, _text: &str) -> Result<Vec<f32>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures_before_success {
            anyhow::bail!("rate limited");
        }
        Ok(self.vector.clone())
    }
}
