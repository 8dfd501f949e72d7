//! Drops requests that were already seen during the crawl.

use super::{Middleware, RequestMiddleware};
use crate::request::{Droppable, Request};
use async_trait::async_trait;
use moka::sync::Cache;
use std::sync::Arc;
use tracing::trace;

const DEFAULT_CAPACITY: u64 = 100_000;

/// Request meta flag that lets a request through even if it was seen before.
pub const DONT_FILTER_META: &str = "dont_filter";

/// Tracks request fingerprints in a bounded cache and drops repeats.
pub struct RequestDeduplicationMiddleware {
    seen: Cache<String, ()>,
    ignore_url_fragments: bool,
    ignore_trailing_slashes: bool,
    ignore_query_string: bool,
}

impl RequestDeduplicationMiddleware {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            seen: Cache::builder().max_capacity(capacity).build(),
            ignore_url_fragments: true,
            ignore_trailing_slashes: true,
            ignore_query_string: false,
        }
    }

    pub fn ignore_url_fragments(mut self, ignore: bool) -> Self {
        self.ignore_url_fragments = ignore;
        self
    }

    pub fn ignore_trailing_slashes(mut self, ignore: bool) -> Self {
        self.ignore_trailing_slashes = ignore;
        self
    }

    pub fn ignore_query_string(mut self, ignore: bool) -> Self {
        self.ignore_query_string = ignore;
        self
    }

    fn fingerprint(&self, request: &Request) -> String {
        let mut url = request.url.clone();
        if self.ignore_url_fragments {
            url.set_fragment(None);
        }
        if self.ignore_query_string {
            url.set_query(None);
        }
        if self.ignore_trailing_slashes && url.path().len() > 1 {
            let trimmed = url.path().trim_end_matches('/').to_string();
            url.set_path(&trimmed);
        }
        format!("{} {}", request.method, url)
    }
}

impl Default for RequestDeduplicationMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestMiddleware for RequestDeduplicationMiddleware {
    async fn handle_request(&self, request: Request) -> Request {
        if request.meta(DONT_FILTER_META).and_then(|v| v.as_bool()) == Some(true) {
            return request;
        }
        let fingerprint = self.fingerprint(&request);
        let entry = self.seen.entry(fingerprint).or_insert(());
        if entry.is_fresh() {
            trace!("First time seeing request: {}", request.url);
            return request;
        }
        let reason = format!("Duplicate request: {}", request.url);
        request.dropped(reason)
    }
}

impl Middleware for RequestDeduplicationMiddleware {
    fn name(&self) -> &str {
        "request_deduplication"
    }

    fn request_leg(self: Arc<Self>) -> Option<Arc<dyn RequestMiddleware>> {
        Some(self)
    }
}
