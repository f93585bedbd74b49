//! Error types for Conclave

use thiserror::Error;

/// Result type alias for Conclave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message fragments that mark a provider failure as rate limiting.
///
/// Providers behind a proxy often surface rate limits as opaque strings
/// rather than structured errors, so classification falls back to matching
/// a lowercase rendering of the message against these markers.
const RATE_LIMIT_MARKERS: [&str; 5] = [
    "429",
    "rate limit",
    "ratelimiterror",
    "throttling",
    "too many tokens",
];

/// Error type for Conclave operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Git operation error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration error, including missing provider credentials.
    /// Fatal: aborts the whole batch.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Review target or supporting file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider rate limit, retried with backoff
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// A collaborator tool (context extractor, packer) failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Agent invocation error
    #[error("Agent error: {0}")]
    Agent(String),
}

impl Error {
    /// Short stable name for the error class, used in logs and audit entries
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Git(_) => "git",
            Error::Config(_) => "configuration",
            Error::NotFound(_) => "not_found",
            Error::RateLimit(_) => "rate_limit",
            Error::ToolExecution(_) => "tool_execution",
            Error::Agent(_) => "agent",
        }
    }

    /// Whether this failure is retry-eligible.
    ///
    /// A structured `RateLimit` is always transient. Any other error is
    /// transient when its message carries one of the known rate-limit
    /// markers, since provider errors frequently arrive stringified.
    pub fn is_transient(&self) -> bool {
        if matches!(self, Error::RateLimit(_)) {
            return true;
        }
        let message = self.to_string().to_lowercase();
        RATE_LIMIT_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }

    /// Whether this failure must abort the entire batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
