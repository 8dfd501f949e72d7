//! # Scheduler Module
//!
//! In-memory store of pending requests for the crawl loop.
//!
//! ## Overview
//!
//! Producers enqueue requests one at a time; the single consumer (the crawl
//! loop) takes the whole current contents with [`Scheduler::drain_all`]. The
//! drain swaps the queue for an empty one under one lock, so an enqueue that
//! races with a drain lands either in the returned batch or in the next one,
//! never both and never lost. Ordering inside a batch is not guaranteed.
//!
//! The queue does not persist: restarting the process loses its contents.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::{Request, Scheduler};
//! use url::Url;
//!
//! let scheduler = Scheduler::new();
//! scheduler.enqueue(Request::new(Url::parse("https://example.com")?));
//!
//! let batch = scheduler.drain_all();
//! assert_eq!(batch.len(), 1);
//! assert!(!scheduler.has_pending());
//! ```

use crate::request::Request;
use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug, Default)]
pub struct Scheduler {
    request_queue: Mutex<Vec<Request>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one request to the queue.
    pub fn enqueue(&self, request: Request) {
        trace!("Enqueuing request: {}", request.url);
        self.request_queue.lock().push(request);
    }

    /// Takes every queued request and leaves the queue empty.
    pub fn drain_all(&self) -> Vec<Request> {
        let batch = std::mem::take(&mut *self.request_queue.lock());
        trace!("Drained {} requests from scheduler", batch.len());
        batch
    }

    /// Returns the number of requests not yet drained.
    #[inline]
    pub fn len(&self) -> usize {
        self.request_queue.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.is_empty()
    }
}
