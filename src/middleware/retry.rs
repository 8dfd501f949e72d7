//! Retries requests that failed at the transport level.

use super::{DONT_FILTER_META, ExceptionAction, ExceptionMiddleware, Middleware};
use crate::downloader::FetchFailure;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Request meta key holding the number of retries already attempted.
pub const RETRY_TIMES_META: &str = "retry_times";

/// Hands failed requests back for another attempt, up to `max_retries` times.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    max_retries: u64,
}

impl RetryMiddleware {
    pub fn new(max_retries: u64) -> Self {
        Self { max_retries }
    }
}

impl Default for RetryMiddleware {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl ExceptionMiddleware for RetryMiddleware {
    async fn handle_exception(&self, failure: FetchFailure) -> ExceptionAction {
        let FetchFailure { request, error } = failure;
        let attempts = request
            .meta(RETRY_TIMES_META)
            .and_then(|value| value.as_u64())
            .unwrap_or(0);

        if attempts >= self.max_retries {
            return ExceptionAction::Drop(format!(
                "Gave up on {} after {} retries: {}",
                request.url, attempts, error
            ));
        }

        debug!(
            "Retrying {} (attempt {} of {}) after: {}",
            request.url,
            attempts + 1,
            self.max_retries,
            error
        );
        ExceptionAction::Retry(
            request
                .with_meta(RETRY_TIMES_META, attempts + 1)
                .with_meta(DONT_FILTER_META, true),
        )
    }
}

impl Middleware for RetryMiddleware {
    fn name(&self) -> &str {
        "retry"
    }

    fn exception_leg(self: Arc<Self>) -> Option<Arc<dyn ExceptionMiddleware>> {
        Some(self)
    }
}
