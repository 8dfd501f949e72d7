//! # Spider Module
//!
//! Defines the `Spider` trait the crawl loop drives.
//!
//! ## Overview
//!
//! A spider supplies the seed requests of a crawl and turns each delivered
//! response into scraped items and further requests. The engine treats the
//! request callback as an opaque identifier; a spider that handles several
//! page kinds can dispatch on [`Request::callback`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::{ParseOutput, Response, Spider, SpiderError};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct Title(String);
//!
//! struct TitleSpider;
//!
//! #[async_trait]
//! impl Spider for TitleSpider {
//!     type Item = Title;
//!
//!     fn start_urls(&self) -> Vec<&'static str> {
//!         vec!["https://example.com"]
//!     }
//!
//!     async fn parse(
//!         &mut self,
//!         response: Response,
//!     ) -> Result<ParseOutput<Self::Item>, SpiderError> {
//!         let mut output = ParseOutput::new();
//!         output.add_item(Title(response.text().into_owned()));
//!         Ok(output)
//!     }
//! }
//! ```

use crate::error::SpiderError;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::fmt::Debug;
use url::Url;

/// Marker for values a spider can emit as items.
pub trait ScrapedItem: Debug + Send + Sync + 'static {}

impl<T> ScrapedItem for T where T: Debug + Send + Sync + 'static {}

/// Items and follow-up requests produced by parsing one response.
#[derive(Debug)]
pub struct ParseOutput<I> {
    pub items: Vec<I>,
    pub requests: Vec<Request>,
}

impl<I> ParseOutput<I> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub fn add_item(&mut self, item: I) {
        self.items.push(item);
    }

    pub fn add_request(&mut self, request: Request) {
        self.requests.push(request);
    }
}

impl<I> Default for ParseOutput<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Defines the contract for a web spider.
#[async_trait]
pub trait Spider: Send + Sync + 'static {
    /// The type of item that the spider scrapes.
    type Item: ScrapedItem;

    /// Returns the initial URLs to start crawling from.
    fn start_urls(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Generates the initial requests to start crawling.
    fn start_requests(&self) -> Result<Vec<Request>, SpiderError> {
        let urls: Result<Vec<Url>, url::ParseError> =
            self.start_urls().into_iter().map(Url::parse).collect();
        Ok(urls?.into_iter().map(Request::new).collect())
    }

    /// Parses a response and extracts scraped items and new requests.
    async fn parse(&mut self, response: Response) -> Result<ParseOutput<Self::Item>, SpiderError>;
}
