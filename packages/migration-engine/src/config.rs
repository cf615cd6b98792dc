use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f32 = 0.85;
const DEFAULT_MEDIUM_CONFIDENCE_THRESHOLD: f32 = 0.70;
const DEFAULT_AMBIGUITY_GAP_THRESHOLD: f32 = 0.10;
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 10;
const DEFAULT_EMBEDDING_MAX_RETRIES: u32 = 3;
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MIN_HTML_LENGTH: usize = 100;
const DEFAULT_SIMILAR_PAGE_COUNT: usize = 5;

/// Tunables for a single pipeline run.
///
/// Fixed per run; not command-line flags. `Config::from_env` fills these
/// from the environment, tests build them directly.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Scores at or above this band as medium-confidence semantic matches.
    pub high_confidence_threshold: f32,
    /// Scores below this orphan the old page.
    pub medium_confidence_threshold: f32,
    /// Best-to-second-best gap below this flags a medium match for review.
    pub ambiguity_gap_threshold: f32,
    pub embedding_dimension: usize,
    pub embedding_batch_size: usize,
    pub embedding_max_retries: u32,
    /// Base delay for exponential backoff between embedding attempts.
    pub embedding_backoff_base: Duration,
    pub fetch_timeout: Duration,
    /// Pages with less raw HTML than this are excluded from content
    /// hashing (failed or placeholder fetches).
    pub min_html_length: usize,
    /// How many nearest neighbors to consider per old page.
    pub similar_page_count: usize,
    /// Drop individual dated blog/news post URLs before fetching.
    pub skip_blog_posts: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            medium_confidence_threshold: DEFAULT_MEDIUM_CONFIDENCE_THRESHOLD,
            ambiguity_gap_threshold: DEFAULT_AMBIGUITY_GAP_THRESHOLD,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            embedding_max_retries: DEFAULT_EMBEDDING_MAX_RETRIES,
            embedding_backoff_base: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
            min_html_length: DEFAULT_MIN_HTML_LENGTH,
            similar_page_count: DEFAULT_SIMILAR_PAGE_COUNT,
            skip_blog_posts: false,
        }
    }
}

impl MatcherConfig {
    /// Check threshold sanity; called before a run starts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.high_confidence_threshold)
            || !(0.0..=1.0).contains(&self.medium_confidence_threshold)
        {
            anyhow::bail!("confidence thresholds must be within [0, 1]");
        }
        if self.medium_confidence_threshold > self.high_confidence_threshold {
            anyhow::bail!(
                "MEDIUM_CONFIDENCE_THRESHOLD ({}) must not exceed HIGH_CONFIDENCE_THRESHOLD ({})",
                self.medium_confidence_threshold,
                self.high_confidence_threshold
            );
        }
        if self.ambiguity_gap_threshold < 0.0 {
            anyhow::bail!("AMBIGUITY_GAP_THRESHOLD must not be negative");
        }
        if self.embedding_dimension == 0 {
            anyhow::bail!("EMBEDDING_DIMENSION must be positive");
        }
        if self.embedding_batch_size == 0 {
            anyhow::bail!("EMBEDDING_BATCH_SIZE must be positive");
        }
        Ok(())
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    pub embedding_model: String,
    pub matcher: MatcherConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let matcher = MatcherConfig {
            high_confidence_threshold: env_f32(
                "HIGH_CONFIDENCE_THRESHOLD",
                DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            )?,
            medium_confidence_threshold: env_f32(
                "MEDIUM_CONFIDENCE_THRESHOLD",
                DEFAULT_MEDIUM_CONFIDENCE_THRESHOLD,
            )?,
            ambiguity_gap_threshold: env_f32(
                "AMBIGUITY_GAP_THRESHOLD",
                DEFAULT_AMBIGUITY_GAP_THRESHOLD,
            )?,
            embedding_dimension: env_usize("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            embedding_batch_size: env_usize(
                "EMBEDDING_BATCH_SIZE",
                DEFAULT_EMBEDDING_BATCH_SIZE,
            )?,
            embedding_max_retries: env_usize(
                "EMBEDDING_MAX_RETRIES",
                DEFAULT_EMBEDDING_MAX_RETRIES as usize,
            )? as u32,
            embedding_backoff_base: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(
                env_usize("FETCH_TIMEOUT_SECONDS", DEFAULT_FETCH_TIMEOUT_SECONDS as usize)?
                    as u64,
            ),
            min_html_length: env_usize("MIN_HTML_LENGTH", DEFAULT_MIN_HTML_LENGTH)?,
            similar_page_count: env_usize("SIMILAR_PAGE_COUNT", DEFAULT_SIMILAR_PAGE_COUNT)?,
            skip_blog_posts: env::var("SKIP_BLOG_POSTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };

        let config = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            matcher,
        };

        config.matcher.validate()?;
        Ok(config)
    }
}

fn env_f32(name: &str, default: f32) -> Result<f32> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
