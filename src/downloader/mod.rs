//! # Downloader Module
//!
//! Buffers requests and dispatches them in concurrent batches.
//!
//! ## Overview
//!
//! [`Downloader::submit`] runs the request leg of the middleware chain right
//! away; a request dropped there never reaches the buffer. Requests that
//! survive wait in the buffer until [`Downloader::flush`], which swaps the
//! buffer for an empty one and fetches the whole batch with at most
//! `concurrency` fetches in flight.
//!
//! Fetches run on spawned tasks. Their results come back to the task that
//! called `flush`, which runs the response or exception leg and the
//! `on_response` callback one result at a time, so middleware never runs
//! concurrently with itself. `flush` returns once every fetch of the batch
//! has completed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::downloader::{Downloader, ReqwestFetcher};
//! use spider_engine::middleware::HttpErrorMiddleware;
//! use std::sync::Arc;
//!
//! let downloader = Downloader::new(
//!     Arc::new(ReqwestFetcher::new()?),
//!     vec![Arc::new(HttpErrorMiddleware::new())],
//!     8,
//! );
//!
//! downloader.submit(request).await;
//! let report = downloader
//!     .flush(|response| println!("{} -> {}", response.url(), response.status))
//!     .await;
//! ```

mod fetch;
mod reqwest_fetcher;

pub use fetch::{FetchFailure, Fetcher};
pub use reqwest_fetcher::ReqwestFetcher;

use crate::error::FetchError;
use crate::middleware::{ExceptionAction, Middleware, MiddlewareManager};
use crate::request::{Droppable, Request};
use crate::response::Response;
use crate::state::CrawlerState;
use crate::stats::StatCollector;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, trace};
use url::Url;

/// Result of [`Downloader::submit`].
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The request passed the request leg and waits for the next flush.
    Buffered,
    /// A request middleware dropped the request.
    Dropped(Request),
}

/// Where in the pipeline a drop happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropStage {
    Response,
    Exception,
}

/// A request or response dropped while flushing.
#[derive(Debug, Clone)]
pub struct DroppedRecord {
    pub url: Url,
    pub stage: DropStage,
    pub reason: String,
}

/// Summary of one [`Downloader::flush`].
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Requests taken from the buffer and handed to the fetcher.
    pub dispatched: usize,
    /// Responses passed to `on_response`.
    pub delivered: usize,
    pub dropped: Vec<DroppedRecord>,
    /// Requests the exception leg asked to fetch again.
    pub retries: Vec<Request>,
    /// Transport failures no exception middleware settled.
    pub unhandled: Vec<FetchFailure>,
}

/// Counts one fetch as in flight for as long as it lives.
struct InFlightGuard {
    state: Arc<CrawlerState>,
}

impl InFlightGuard {
    fn enter(state: Arc<CrawlerState>) -> Self {
        state.in_flight_requests.fetch_add(1, Ordering::SeqCst);
        Self { state }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.in_flight_requests.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Downloader {
    buffer: Mutex<Vec<Request>>,
    middlewares: MiddlewareManager,
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
    state: Arc<CrawlerState>,
    stats: Arc<StatCollector>,
}

impl Downloader {
    /// Creates a downloader. A concurrency limit of zero is raised to one.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        middlewares: Vec<Arc<dyn Middleware>>,
        concurrency: usize,
    ) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            middlewares: MiddlewareManager::new(middlewares),
            fetcher,
            concurrency: concurrency.max(1),
            state: CrawlerState::new(),
            stats: Arc::new(StatCollector::new()),
        }
    }

    pub(crate) fn with_observers(
        mut self,
        state: Arc<CrawlerState>,
        stats: Arc<StatCollector>,
    ) -> Self {
        self.state = state;
        self.stats = stats;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of requests waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn stats(&self) -> Arc<StatCollector> {
        Arc::clone(&self.stats)
    }

    /// Runs the request leg and buffers the request unless it was dropped.
    pub async fn submit(&self, request: Request) -> SubmitOutcome {
        let request = self.middlewares.process_request(request).await;
        if request.was_dropped() {
            self.stats.increment_requests_dropped();
            return SubmitOutcome::Dropped(request);
        }

        trace!("Buffering request for URL: {}", request.url);
        self.buffer.lock().push(request);
        SubmitOutcome::Buffered
    }

    /// Dispatches every buffered request and waits for the whole batch.
    ///
    /// `on_response` is called once for each response that survives the
    /// response leg, including responses recovered by the exception leg.
    pub async fn flush<F>(&self, mut on_response: F) -> FlushReport
    where
        F: FnMut(Response),
    {
        let batch = std::mem::take(&mut *self.buffer.lock());
        let mut report = FlushReport {
            dispatched: batch.len(),
            ..FlushReport::default()
        };
        if batch.is_empty() {
            return report;
        }
        self.stats.increment_batches_flushed();

        debug!(
            "Flushing {} requests with concurrency limit {}",
            batch.len(),
            self.concurrency
        );
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, Request> = HashMap::with_capacity(batch.len());

        for request in batch {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let state = Arc::clone(&self.state);
            let stats = Arc::clone(&self.stats);
            let retained = request.clone();

            let handle = tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return Err(FetchFailure::new(
                            request,
                            FetchError::Aborted(e.to_string()),
                        ));
                    }
                };

                let _in_flight = InFlightGuard::enter(state);
                stats.increment_requests_sent();
                trace!("Downloading request for URL: {}", request.url);
                fetcher.fetch(request).await
            });
            pending.insert(handle.id(), retained);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, Ok(response))) => {
                    pending.remove(&id);
                    self.stats.increment_requests_succeeded();
                    self.stats.increment_responses_received();
                    self.stats.record_response_status(response.status.as_u16());
                    self.stats.add_bytes_downloaded(response.body.len());
                    self.deliver(response, &mut on_response, &mut report).await;
                }
                Ok((id, Err(failure))) => {
                    pending.remove(&id);
                    self.handle_failure(failure, &mut on_response, &mut report)
                        .await;
                }
                Err(e) => {
                    let reason = if e.is_panic() {
                        "fetch task panicked"
                    } else {
                        "fetch task was cancelled"
                    };
                    match pending.remove(&e.id()) {
                        Some(request) => {
                            error!("Download task for URL {} failed: {}", request.url, reason);
                            let error = FetchError::Aborted(reason.to_string());
                            let failure = FetchFailure::new(request, error);
                            self.handle_failure(failure, &mut on_response, &mut report)
                                .await;
                        }
                        None => {
                            self.stats.increment_requests_failed();
                            error!("A download task failed: {:?}", e);
                        }
                    }
                }
            }
        }

        trace!(
            "Flush finished: dispatched={}, delivered={}, dropped={}, retries={}",
            report.dispatched,
            report.delivered,
            report.dropped.len(),
            report.retries.len()
        );
        report
    }

    async fn deliver<F>(&self, response: Response, on_response: &mut F, report: &mut FlushReport)
    where
        F: FnMut(Response),
    {
        let response = self.middlewares.process_response(response).await;
        if response.was_dropped() {
            self.stats.increment_responses_dropped();
            report.dropped.push(DroppedRecord {
                url: response.url().clone(),
                stage: DropStage::Response,
                reason: response.drop_reason().unwrap_or_default().to_string(),
            });
            return;
        }

        report.delivered += 1;
        on_response(response);
    }

    async fn handle_failure<F>(
        &self,
        failure: FetchFailure,
        on_response: &mut F,
        report: &mut FlushReport,
    ) where
        F: FnMut(Response),
    {
        let url = failure.request.url.clone();
        match self.middlewares.process_exception(failure).await {
            ExceptionAction::Continue(failure) => {
                self.stats.increment_requests_failed();
                error!(
                    "Download error for URL {} was not handled by any middleware: {}",
                    url, failure.error
                );
                report.unhandled.push(failure);
            }
            ExceptionAction::Drop(reason) => {
                self.stats.increment_requests_failed();
                debug!("Failed request dropped for URL {}: {}", url, reason);
                report.dropped.push(DroppedRecord {
                    url,
                    stage: DropStage::Exception,
                    reason,
                });
            }
            ExceptionAction::Recover(response) => {
                trace!("Exception middleware recovered a response for URL: {}", url);
                self.stats.increment_responses_received();
                self.stats.record_response_status(response.status.as_u16());
                self.deliver(response, on_response, report).await;
            }
            ExceptionAction::Retry(request) => {
                self.stats.increment_requests_retried();
                report.retries.push(request);
            }
        }
    }
}
