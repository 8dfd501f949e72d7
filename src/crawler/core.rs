//! The core Crawler implementation.
//!
//! This module defines the `Crawler` struct, which drives a crawl in batches:
//! it drains the scheduler, submits the batch to the downloader, flushes it,
//! hands every delivered response to the spider and schedules what the
//! spider discovers. Batches are paced by the crawler's [`Clock`]; scraped
//! items flow to the item processor task over a bounded channel.

use crate::clock::Clock;
use crate::downloader::{Downloader, SubmitOutcome};
use crate::error::SpiderError;
use crate::pipeline::Pipeline;
use crate::request::Droppable;
use crate::response::Response;
use crate::scheduler::Scheduler;
use crate::spider::Spider;
use crate::state::CrawlerState;
use crate::stats::StatCollector;
use futures_util::future::join_all;
use kanal::{AsyncSender, bounded_async};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Drives the scheduler, downloader, spider and item pipelines.
pub struct Crawler<S: Spider> {
    scheduler: Arc<Scheduler>,
    downloader: Downloader,
    spider: S,
    item_pipelines: Vec<Box<dyn Pipeline<S::Item>>>,
    clock: Arc<dyn Clock>,
    request_delay: Duration,
    max_concurrent_pipelines: usize,
    channel_capacity: usize,
    state: Arc<CrawlerState>,
    stats: Arc<StatCollector>,
}

impl<S> Crawler<S>
where
    S: Spider + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        scheduler: Arc<Scheduler>,
        downloader: Downloader,
        spider: S,
        item_pipelines: Vec<Box<dyn Pipeline<S::Item>>>,
        clock: Arc<dyn Clock>,
        request_delay: Duration,
        max_concurrent_pipelines: usize,
        channel_capacity: usize,
        state: Arc<CrawlerState>,
        stats: Arc<StatCollector>,
    ) -> Self {
        Crawler {
            scheduler,
            downloader,
            spider,
            item_pipelines,
            clock,
            request_delay,
            max_concurrent_pipelines,
            channel_capacity,
            state,
            stats,
        }
    }

    /// Runs the crawl until the scheduler is empty and nothing is in flight.
    pub async fn start_crawl(self) -> Result<(), SpiderError> {
        let Crawler {
            scheduler,
            downloader,
            mut spider,
            item_pipelines,
            clock,
            request_delay,
            max_concurrent_pipelines,
            channel_capacity,
            state,
            stats,
        } = self;

        info!(
            "Crawler starting crawl with configuration: concurrency={}, request_delay={:?}, max_concurrent_pipelines={}",
            downloader.concurrency(),
            request_delay,
            max_concurrent_pipelines
        );

        for mut request in spider.start_requests()? {
            request.url.set_fragment(None);
            scheduler.enqueue(request);
            stats.increment_requests_enqueued();
        }

        let pipelines = Arc::new(item_pipelines);
        let (item_tx, item_rx) = bounded_async(channel_capacity.max(1));
        let item_processor_task = super::spawn_item_processor_task(
            state.clone(),
            item_rx,
            pipelines.clone(),
            max_concurrent_pipelines,
            stats.clone(),
        );

        let mut next_batch_at = clock.now();
        let mut batches = 0usize;
        while scheduler.has_pending() || !state.is_download_idle() {
            clock.sleep_until(next_batch_at).await;

            let batch = scheduler.drain_all();
            next_batch_at = clock.now() + request_delay;
            batches += 1;
            trace!("Starting batch {} with {} requests", batches, batch.len());

            for request in batch {
                if let SubmitOutcome::Dropped(request) = downloader.submit(request).await {
                    trace!(
                        "Request not dispatched: {} ({})",
                        request.url,
                        request.drop_reason().unwrap_or_default()
                    );
                }
            }

            let mut responses = Vec::new();
            let report = downloader.flush(|response| responses.push(response)).await;

            for request in report.retries {
                scheduler.enqueue(request);
                stats.increment_requests_enqueued();
            }
            for response in responses {
                handle_response(&mut spider, response, &scheduler, &item_tx, &state, &stats).await;
            }
        }
        info!("Crawl has become idle after {} batches, shutting down.", batches);

        drop(item_tx);
        if let Err(e) = item_processor_task.await {
            error!("Item processor task failed: {}", e);
        }
        if !state.is_idle() {
            warn!("Crawler stopped with work still in progress");
        }

        info!("Closing item pipelines...");
        let closing_futures: Vec<_> = pipelines.iter().map(|p| p.close()).collect();
        for (pipeline, result) in pipelines.iter().zip(join_all(closing_futures).await) {
            if let Err(e) = result {
                warn!("Pipeline '{}' failed to close: {}", pipeline.name(), e);
            }
        }

        info!(
            "Crawl finished successfully. Stats: requests_enqueued={}, requests_succeeded={}, items_scraped={}",
            stats.requests_enqueued.load(Ordering::SeqCst),
            stats.requests_succeeded.load(Ordering::SeqCst),
            stats.items_scraped.load(Ordering::SeqCst)
        );
        Ok(())
    }

    /// Returns the `StatCollector` shared by this crawler's components.
    ///
    /// The counters can be read at any time during or after the crawl.
    pub fn get_stats(&self) -> Arc<StatCollector> {
        Arc::clone(&self.stats)
    }
}

async fn handle_response<S: Spider>(
    spider: &mut S,
    response: Response,
    scheduler: &Scheduler,
    item_tx: &AsyncSender<S::Item>,
    state: &CrawlerState,
    stats: &StatCollector,
) {
    let url = response.url().clone();
    let output = match spider.parse(response).await {
        Ok(output) => output,
        Err(e) => {
            error!("Spider failed to parse response from {}: {}", url, e);
            return;
        }
    };
    debug!(
        "Parsed {}: {} items, {} requests",
        url,
        output.items.len(),
        output.requests.len()
    );

    for mut request in output.requests {
        request.url.set_fragment(None);
        scheduler.enqueue(request);
        stats.increment_requests_enqueued();
    }

    for item in output.items {
        stats.increment_items_scraped();
        state.processing_items.fetch_add(1, Ordering::SeqCst);
        if item_tx.send(item).await.is_err() {
            error!("Item channel closed, dropping item scraped from {}", url);
            state.processing_items.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
