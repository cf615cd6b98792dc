//! Fatal error taxonomy for pipeline runs.
//!
//! Per-item failures (a single fetch or embedding) are handled inside the
//! stages and never surface here; only configuration, input validation,
//! and persistence failures abort a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credentials or invalid thresholds; nothing has run yet.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected input (empty URL lists); nothing has run yet.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The storage collaborator failed; the session is marked failed.
    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),
}
