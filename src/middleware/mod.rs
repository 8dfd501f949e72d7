//! # Middleware Module
//!
//! Hooks that inspect, rewrite or drop traffic on its way through the
//! downloader.
//!
//! ## Legs
//!
//! A middleware takes part in any subset of three legs:
//!
//! - **Request leg** ([`RequestMiddleware`]): runs before dispatch. Returning
//!   a dropped request stops the chain and the request is never fetched.
//! - **Response leg** ([`ResponseMiddleware`]): runs after a successful
//!   fetch. Returning a dropped response stops the chain and the response
//!   never reaches the caller.
//! - **Exception leg** ([`ExceptionMiddleware`]): runs when the fetcher
//!   reports a transport failure. Each stage either passes the failure on
//!   with [`ExceptionAction::Continue`] or settles it.
//!
//! Stages run in registration order within each leg.
//!
//! ## Registration
//!
//! Every middleware implements [`Middleware`] and opts into legs by
//! overriding the matching conversion:
//!
//! ```rust,ignore
//! use spider_engine::middleware::{Middleware, RequestMiddleware};
//! use spider_engine::{Droppable, Request};
//! use std::sync::Arc;
//!
//! struct SkipAdmin;
//!
//! #[async_trait::async_trait]
//! impl RequestMiddleware for SkipAdmin {
//!     async fn handle_request(&self, request: Request) -> Request {
//!         if request.url.path().starts_with("/admin") {
//!             return request.dropped("admin pages are off limits");
//!         }
//!         request
//!     }
//! }
//!
//! impl Middleware for SkipAdmin {
//!     fn name(&self) -> &str {
//!         "skip_admin"
//!     }
//!
//!     fn request_leg(self: Arc<Self>) -> Option<Arc<dyn RequestMiddleware>> {
//!         Some(self)
//!     }
//! }
//! ```
//!
//! The legs a middleware supports are resolved once, when the
//! [`MiddlewareManager`] is built.

mod deduplication;
mod http_error;
mod manager;
mod proxy;
mod retry;
mod user_agent;

pub use deduplication::{DONT_FILTER_META, RequestDeduplicationMiddleware};
pub use http_error::HttpErrorMiddleware;
pub use manager::MiddlewareManager;
pub use proxy::ProxyMiddleware;
pub use retry::{RETRY_TIMES_META, RetryMiddleware};
pub use user_agent::UserAgentMiddleware;

use crate::downloader::FetchFailure;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::sync::Arc;

/// Request leg: runs once per request before it is buffered for dispatch.
#[async_trait]
pub trait RequestMiddleware: Send + Sync {
    async fn handle_request(&self, request: Request) -> Request;
}

/// Response leg: runs once per fetched response.
#[async_trait]
pub trait ResponseMiddleware: Send + Sync {
    async fn handle_response(&self, response: Response) -> Response;
}

/// Exception leg: runs when a fetch fails at the transport level.
#[async_trait]
pub trait ExceptionMiddleware: Send + Sync {
    async fn handle_exception(&self, failure: FetchFailure) -> ExceptionAction;
}

/// What an exception stage decided to do with a transport failure.
#[derive(Debug)]
pub enum ExceptionAction {
    /// Not handled here; the next stage sees the failure.
    Continue(FetchFailure),
    /// Give up on the request with a reason.
    Drop(String),
    /// Replace the failure with a synthesized response.
    Recover(Response),
    /// Hand the request back to the crawl loop for another attempt.
    Retry(Request),
}

/// A component registered with the downloader.
pub trait Middleware: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn request_leg(self: Arc<Self>) -> Option<Arc<dyn RequestMiddleware>> {
        None
    }

    fn response_leg(self: Arc<Self>) -> Option<Arc<dyn ResponseMiddleware>> {
        None
    }

    fn exception_leg(self: Arc<Self>) -> Option<Arc<dyn ExceptionMiddleware>> {
        None
    }
}
