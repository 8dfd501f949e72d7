//! # Builder Module
//!
//! Provides the `CrawlerBuilder`, a fluent API for assembling a `Crawler`
//! from a spider, middleware, pipelines and a handful of settings.
//!
//! ## Overview
//!
//! Settings live in a [`CrawlerConfig`], which can also be loaded from JSON
//! (or any serde format) and applied wholesale with
//! [`CrawlerBuilder::with_config`]. Unless replaced, the crawler fetches over
//! [`ReqwestFetcher`] and paces batches with the [`SystemClock`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::CrawlerBuilder;
//! use spider_engine::middleware::{HttpErrorMiddleware, RetryMiddleware};
//! use std::time::Duration;
//!
//! async fn run() -> Result<(), SpiderError> {
//!     let crawler = CrawlerBuilder::new(MySpider)
//!         .concurrency(8)
//!         .request_delay(Duration::from_millis(500))
//!         .add_middleware(RetryMiddleware::default())
//!         .add_middleware(HttpErrorMiddleware::new())
//!         .add_pipeline(MyPipeline)
//!         .build()?;
//!
//!     crawler.start_crawl().await
//! }
//! ```

use crate::clock::{Clock, SystemClock};
use crate::crawler::Crawler;
use crate::downloader::{Downloader, Fetcher, ReqwestFetcher};
use crate::error::SpiderError;
use crate::middleware::Middleware;
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;
use crate::spider::Spider;
use crate::state::CrawlerState;
use crate::stats::StatCollector;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the crawler's concurrency and pacing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// The maximum number of fetches in flight during one flush.
    pub concurrency: usize,
    /// Minimum time between draining two consecutive batches.
    #[serde(rename = "request_delay_secs", deserialize_with = "deserialize_secs")]
    pub request_delay: Duration,
    /// The maximum number of items processed by the pipelines at once.
    pub max_concurrent_pipelines: usize,
    /// The capacity of the channel carrying items to the pipelines.
    pub channel_capacity: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        CrawlerConfig {
            concurrency: num_cpus::get().max(16),
            request_delay: Duration::ZERO,
            max_concurrent_pipelines: num_cpus::get().min(8),
            channel_capacity: 1000,
        }
    }
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

pub struct CrawlerBuilder<S: Spider> {
    crawler_config: CrawlerConfig,
    spider: Option<S>,
    fetcher: Option<Arc<dyn Fetcher>>,
    clock: Option<Arc<dyn Clock>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    item_pipelines: Vec<Box<dyn Pipeline<S::Item>>>,
}

impl<S: Spider> CrawlerBuilder<S> {
    /// Creates a new `CrawlerBuilder` for a given spider.
    pub fn new(spider: S) -> Self {
        Self {
            crawler_config: CrawlerConfig::default(),
            spider: Some(spider),
            fetcher: None,
            clock: None,
            middlewares: Vec::new(),
            item_pipelines: Vec::new(),
        }
    }

    /// Sets the maximum number of concurrent fetches.
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.crawler_config.concurrency = limit;
        self
    }

    /// Sets the delay between batches.
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.crawler_config.request_delay = delay;
        self
    }

    /// Sets the maximum number of concurrent pipelines.
    pub fn max_concurrent_pipelines(mut self, limit: usize) -> Self {
        self.crawler_config.max_concurrent_pipelines = limit;
        self
    }

    /// Sets the capacity of the item channel.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.crawler_config.channel_capacity = capacity;
        self
    }

    /// Replaces every setting with the given configuration.
    pub fn with_config(mut self, config: CrawlerConfig) -> Self {
        self.crawler_config = config;
        self
    }

    /// Sets a custom fetcher for the crawler.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the clock used to pace batches.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Adds a middleware. Each leg runs its middleware in the order they were added.
    pub fn add_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Adds an item pipeline to the crawler.
    pub fn add_pipeline<P>(mut self, pipeline: P) -> Self
    where
        P: Pipeline<S::Item>,
    {
        self.item_pipelines.push(Box::new(pipeline));
        self
    }

    /// Builds the `Crawler`, wiring one `StatCollector` and `CrawlerState` through every component.
    pub fn build(mut self) -> Result<Crawler<S>, SpiderError> {
        let spider = self.validate_and_get_spider()?;
        let config = self.crawler_config;

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => {
                let fetcher = ReqwestFetcher::new().map_err(|e| {
                    SpiderError::GeneralError(format!("Failed to build HTTP client: {}", e))
                })?;
                Arc::new(fetcher)
            }
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        debug!(
            "Building crawler with {} middlewares and {} pipelines",
            self.middlewares.len(),
            self.item_pipelines.len()
        );

        let state = CrawlerState::new();
        let stats = Arc::new(StatCollector::new());
        let downloader = Downloader::new(fetcher, self.middlewares, config.concurrency)
            .with_observers(Arc::clone(&state), Arc::clone(&stats));

        Ok(Crawler::new(
            Arc::new(Scheduler::new()),
            downloader,
            spider,
            self.item_pipelines,
            clock,
            config.request_delay,
            config.max_concurrent_pipelines,
            config.channel_capacity,
            state,
            stats,
        ))
    }

    fn validate_and_get_spider(&mut self) -> Result<S, SpiderError> {
        if self.crawler_config.concurrency == 0 {
            return Err(SpiderError::ConfigurationError(
                "concurrency must be greater than 0.".to_string(),
            ));
        }
        if self.crawler_config.channel_capacity == 0 {
            return Err(SpiderError::ConfigurationError(
                "channel_capacity must be greater than 0.".to_string(),
            ));
        }
        self.spider.take().ok_or_else(|| {
            SpiderError::ConfigurationError("Crawler must have a spider.".to_string())
        })
    }
}
