//! Error types shared by the engine, its collaborators and the HTTP layer.

use thiserror::Error;

use crate::models::Ticket;

/// Failures reported by external collaborators (manifest index, git, tracker,
/// production monitor).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Errors surfaced by the release correlation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required endpoint, credential or project list is missing.
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Start release '{start}' could not be found")]
    RangeNotFound { start: String },

    #[error("End release '{end}' was not found after start release '{start}'")]
    RangeUnterminated { start: String, end: String },

    #[error("External fetch failed: {0}")]
    ExternalFetchFailed(#[from] SourceError),

    /// Pagination stopped before every page was read. `collected` holds the
    /// tickets from the pages that did succeed.
    #[error("Incomplete result after {} tickets: {source}", collected.len())]
    IncompleteResult {
        collected: Vec<Ticket>,
        #[source]
        source: SourceError,
    },

    #[error("Ticket cache error: {0}")]
    Cache(anyhow::Error),
}

impl EngineError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalFetchFailed(_) | Self::IncompleteResult { .. }
        )
    }
}
