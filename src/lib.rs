//! # spider-engine
//!
//! Request pipeline and concurrency engine for web crawlers.
//!
//! Provides the pieces a crawl is made of: a [`Scheduler`] queue, a
//! middleware chain with request, response and exception legs, a batching
//! [`Downloader`] with bounded concurrency, proxy resolution, an injectable
//! [`Clock`], and the [`Crawler`] loop that ties them to a [`Spider`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::prelude::*;
//!
//! #[derive(Debug)]
//! struct Page {
//!     url: String,
//! }
//!
//! struct MySpider;
//!
//! #[async_trait]
//! impl Spider for MySpider {
//!     type Item = Page;
//!     fn start_urls(&self) -> Vec<&'static str> { vec!["https://example.com"] }
//!     async fn parse(
//!         &mut self,
//!         response: Response,
//!     ) -> Result<ParseOutput<Self::Item>, SpiderError> {
//!         let mut output = ParseOutput::new();
//!         output.add_item(Page { url: response.url().to_string() });
//!         Ok(output)
//!     }
//! }
//!
//! async fn run_crawler() -> Result<(), SpiderError> {
//!     let crawler = CrawlerBuilder::new(MySpider)
//!         .add_middleware(HttpErrorMiddleware::new())
//!         .build()?;
//!     crawler.start_crawl().await
//! }
//! ```

pub mod builder;
pub mod clock;
pub mod crawler;
pub mod downloader;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod prelude;
pub mod proxy;
pub mod request;
pub mod response;
pub mod scheduler;
pub mod spider;
pub mod state;
pub mod stats;

pub use builder::{CrawlerBuilder, CrawlerConfig};
pub use clock::{Clock, FakeClock, SystemClock};
pub use crawler::Crawler;
pub use downloader::{Downloader, FetchFailure, Fetcher, FlushReport, ReqwestFetcher, SubmitOutcome};
pub use error::{FetchError, PipelineError, SpiderError};
pub use pipeline::Pipeline;
pub use proxy::{Proxy, ProxyOptions};
pub use request::{Droppable, Request};
pub use response::Response;
pub use scheduler::Scheduler;
pub use spider::{ParseOutput, ScrapedItem, Spider};
pub use stats::{StatCollector, StatsSnapshot};

pub use async_trait::async_trait;
pub use tokio;
