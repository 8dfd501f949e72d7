//! # Statistics Module
//!
//! Counters describing a crawl while it runs and after it finished.
//!
//! The `StatCollector` is shared by the downloader, the crawl loop and the
//! item processor. Counters are atomics and the status histogram is a
//! `DashMap`, so any task may update or read them mid-crawl. For reporting,
//! [`StatCollector::snapshot`] copies everything into a plain
//! [`StatsSnapshot`], which serializes to JSON with status codes in
//! ascending order.
//!
//! ```rust,ignore
//! let stats = crawler.get_stats();
//! crawler.start_crawl().await?;
//!
//! println!("{}", stats);
//! println!("{}", stats.to_json_string_pretty()?);
//! ```

use crate::error::SpiderError;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Live crawl counters.
#[derive(Debug)]
pub struct StatCollector {
    pub start_time: Instant,

    /// Flushes that dispatched at least one request.
    pub batches_flushed: AtomicUsize,

    pub requests_enqueued: AtomicUsize,
    pub requests_sent: AtomicUsize,
    pub requests_succeeded: AtomicUsize,
    pub requests_failed: AtomicUsize,
    pub requests_retried: AtomicUsize,
    /// Requests dropped by the request leg.
    pub requests_dropped: AtomicUsize,

    pub responses_received: AtomicUsize,
    /// Responses dropped by the response leg.
    pub responses_dropped: AtomicUsize,
    pub response_status_counts: DashMap<u16, usize>,
    pub total_bytes_downloaded: AtomicUsize,

    pub items_scraped: AtomicUsize,
    pub items_processed: AtomicUsize,
    pub items_dropped_by_pipeline: AtomicUsize,
}

/// Point-in-time copy of a [`StatCollector`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub elapsed_secs: f64,
    pub batches_flushed: usize,
    pub requests_enqueued: usize,
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub requests_dropped: usize,
    pub responses_received: usize,
    pub responses_dropped: usize,
    pub response_status_counts: BTreeMap<u16, usize>,
    pub total_bytes_downloaded: usize,
    pub items_scraped: usize,
    pub items_processed: usize,
    pub items_dropped_by_pipeline: usize,
}

impl StatsSnapshot {
    pub fn requests_per_second(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.requests_sent as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

impl StatCollector {
    pub(crate) fn new() -> Self {
        StatCollector {
            start_time: Instant::now(),
            batches_flushed: AtomicUsize::new(0),
            requests_enqueued: AtomicUsize::new(0),
            requests_sent: AtomicUsize::new(0),
            requests_succeeded: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            requests_retried: AtomicUsize::new(0),
            requests_dropped: AtomicUsize::new(0),
            responses_received: AtomicUsize::new(0),
            responses_dropped: AtomicUsize::new(0),
            response_status_counts: DashMap::new(),
            total_bytes_downloaded: AtomicUsize::new(0),
            items_scraped: AtomicUsize::new(0),
            items_processed: AtomicUsize::new(0),
            items_dropped_by_pipeline: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicUsize| counter.load(Ordering::SeqCst);

        StatsSnapshot {
            elapsed_secs: self.elapsed().as_secs_f64(),
            batches_flushed: load(&self.batches_flushed),
            requests_enqueued: load(&self.requests_enqueued),
            requests_sent: load(&self.requests_sent),
            requests_succeeded: load(&self.requests_succeeded),
            requests_failed: load(&self.requests_failed),
            requests_retried: load(&self.requests_retried),
            requests_dropped: load(&self.requests_dropped),
            responses_received: load(&self.responses_received),
            responses_dropped: load(&self.responses_dropped),
            response_status_counts: self
                .response_status_counts
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            total_bytes_downloaded: load(&self.total_bytes_downloaded),
            items_scraped: load(&self.items_scraped),
            items_processed: load(&self.items_processed),
            items_dropped_by_pipeline: load(&self.items_dropped_by_pipeline),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub(crate) fn increment_batches_flushed(&self) {
        bump(&self.batches_flushed);
    }

    pub(crate) fn increment_requests_enqueued(&self) {
        bump(&self.requests_enqueued);
    }

    pub(crate) fn increment_requests_sent(&self) {
        bump(&self.requests_sent);
    }

    pub(crate) fn increment_requests_succeeded(&self) {
        bump(&self.requests_succeeded);
    }

    pub(crate) fn increment_requests_failed(&self) {
        bump(&self.requests_failed);
    }

    pub(crate) fn increment_requests_retried(&self) {
        bump(&self.requests_retried);
    }

    pub(crate) fn increment_requests_dropped(&self) {
        bump(&self.requests_dropped);
    }

    pub(crate) fn increment_responses_received(&self) {
        bump(&self.responses_received);
    }

    pub(crate) fn increment_responses_dropped(&self) {
        bump(&self.responses_dropped);
    }

    pub(crate) fn record_response_status(&self, status_code: u16) {
        *self.response_status_counts.entry(status_code).or_insert(0) += 1;
    }

    pub(crate) fn add_bytes_downloaded(&self, bytes: usize) {
        self.total_bytes_downloaded.fetch_add(bytes, Ordering::SeqCst);
    }

    pub(crate) fn increment_items_scraped(&self) {
        bump(&self.items_scraped);
    }

    pub(crate) fn increment_items_processed(&self) {
        bump(&self.items_processed);
    }

    pub(crate) fn increment_items_dropped_by_pipeline(&self) {
        bump(&self.items_dropped_by_pipeline);
    }

    /// Number of responses recorded with `status_code`.
    pub fn status_count(&self, status_code: u16) -> usize {
        self.response_status_counts
            .get(&status_code)
            .map_or(0, |count| *count)
    }

    pub fn to_json_string(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.snapshot();

        writeln!(f, "\nCrawl Statistics")?;
        writeln!(f, "----------------")?;
        writeln!(
            f,
            "  elapsed   : {:.2}s over {} batches ({:.2} req/s)",
            s.elapsed_secs,
            s.batches_flushed,
            s.requests_per_second()
        )?;
        writeln!(
            f,
            "  requests  : enqueued: {}, sent: {}, ok: {}, fail: {}, retry: {}, drop: {}",
            s.requests_enqueued,
            s.requests_sent,
            s.requests_succeeded,
            s.requests_failed,
            s.requests_retried,
            s.requests_dropped
        )?;
        writeln!(
            f,
            "  responses : received: {}, dropped: {}, downloaded: {}",
            s.responses_received,
            s.responses_dropped,
            human_bytes(s.total_bytes_downloaded)
        )?;
        writeln!(
            f,
            "  items     : scraped: {}, processed: {}, dropped: {}",
            s.items_scraped, s.items_processed, s.items_dropped_by_pipeline
        )?;

        write!(f, "  status    : ")?;
        if s.response_status_counts.is_empty() {
            writeln!(f, "none")?;
        } else {
            let histogram: Vec<String> = s
                .response_status_counts
                .iter()
                .map(|(code, count)| format!("{}: {}", code, count))
                .collect();
            writeln!(f, "{}", histogram.join(", "))?;
        }
        Ok(())
    }
}
