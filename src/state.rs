//! Module for tracking the operational state of the crawler.
//!
//! This module defines the `CrawlerState` struct, which keeps atomic counters
//! of the work currently in progress:
//! - The number of fetches currently in flight.
//! - The number of scraped items currently being processed by pipelines.
//!
//! The crawl loop uses it, together with the scheduler, to decide when the
//! crawl has run out of work.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Represents the shared state of the crawler's various actors.
#[derive(Debug, Default)]
pub struct CrawlerState {
    /// The number of requests currently being fetched.
    pub in_flight_requests: AtomicUsize,
    /// The number of items currently being processed by pipelines.
    pub processing_items: AtomicUsize,
}

impl CrawlerState {
    /// Creates a new, atomically reference-counted `CrawlerState`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether no fetch is in flight.
    pub fn is_download_idle(&self) -> bool {
        self.in_flight_requests.load(Ordering::SeqCst) == 0
    }

    /// Checks if all crawler activities are idle.
    pub fn is_idle(&self) -> bool {
        self.is_download_idle() && self.processing_items.load(Ordering::SeqCst) == 0
    }
}
