//! Error types for every stage of the publishing pipeline.
//!
//! Errors are contained at the smallest enclosing unit of work:
//!
//! | Error | Scope | Handling |
//! |-------|-------|----------|
//! | [`SourceError`] | category | category skipped, run continues |
//! | [`StorageError`] | category (filter) / article (save) | skipped, run continues |
//! | [`GenerationError`] | one provider call | retried or failed over by the rewrite engine |
//! | [`ParseError`] | article | article skipped, no retry |
//! | [`PublishError`] | article | article skipped, no retry |
//! | [`AnnouncementError`] | one announcement | logged and swallowed |
//!
//! [`PipelineError`] is the umbrella the orchestrator uses internally. Nothing escapes a run.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static RATE_LIMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)rate.?limit").unwrap());

/// Failure talking to the news source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid or foreign article url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Other(String),
}

/// Failure reading or writing the relational store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("empty response received from model")]
    EmptyResponse,
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for GenerationError {
    /// Request urls can carry credentials, so they are dropped from the error.
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Transport(e.without_url())
    }
}

impl GenerationError {
    /// Whether this failure means the credential's quota is exhausted.
    ///
    /// True for an explicit rate-limit variant, an HTTP 429, or any message that
    /// looks like "rate limit" / "rate-limit" / "ratelimit".
    pub fn is_rate_limit(&self) -> bool {
        match self {
            GenerationError::RateLimited(_) => true,
            GenerationError::Status { status: 429, .. } => true,
            GenerationError::Transport(e) if e.status().map(|s| s.as_u16()) == Some(429) => true,
            other => RATE_LIMIT_RE.is_match(&other.to_string()),
        }
    }
}

/// The model's answer could not be turned into a [`crate::models::RewrittenDocument`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document is empty")]
    Empty,
    #[error("opening code fence has no closing fence")]
    UnterminatedFence,
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),
}

/// Failure publishing to the CMS.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("CMS rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("CMS response missing `{0}`")]
    MissingField(&'static str),
}

/// Failure emitting one social announcement. Never fatal.
#[derive(Debug, Error)]
pub enum AnnouncementError {
    #[error("announcement text is empty")]
    EmptyText,
    #[error("cannot derive an image filename from title {0:?}")]
    InvalidFilename(String),
    #[error("image download failed: {0}")]
    ImageDownload(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("social network rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Umbrella error for one step of the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source: {0}")]
    Source(#[from] SourceError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("all credentials exhausted without a usable answer")]
    GenerationExhausted,
    #[error("parse: {0}")]
    Parse(#[from] ParseError),
    #[error("publish: {0}")]
    Publish(#[from] PublishError),
    #[error("record encoding: {0}")]
    Encode(#[from] serde_json::Error),
}
