//! Error types shared across the engine.
//!
//! Policy drops are not errors and never appear here. Transport failures are
//! described by [`FetchError`] and travel through the exception leg of the
//! middleware chain; everything that aborts a crawl before it starts is a
//! [`SpiderError`].

use thiserror::Error;

/// Errors surfaced by crawler construction, spiders and pipelines.
#[derive(Debug, Error)]
pub enum SpiderError {
    /// Invalid configuration detected at load or build time.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),

    #[error("{0}")]
    GeneralError(String),
}

/// Errors raised by item pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Item processing failed: {0}")]
    ItemError(String),

    #[error("Pipeline I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Transport-level failure reported by a fetcher instead of a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("invalid proxy configuration: {0}")]
    InvalidProxy(String),

    /// The fetch never ran to completion (e.g. the dispatcher shut down).
    #[error("fetch aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}
