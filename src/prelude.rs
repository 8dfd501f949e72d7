//! A "prelude" for users of the `spider-engine` crate.
//!
//! Re-exports the traits and types needed to write a spider, a pipeline or a
//! middleware and to run a crawl.
//!
//! # Example
//!
//! ```
//! use spider_engine::prelude::*;
//! ```

pub use crate::{
    // Core structs
    Crawler,
    CrawlerBuilder,
    Request,
    Response,
    // Core traits
    Clock,
    Droppable,
    Fetcher,
    Pipeline,
    Spider,
    // Spider output and errors
    ParseOutput,
    PipelineError,
    SpiderError,
    // Essential re-exports for trait implementation
    async_trait,
};

pub use crate::middleware::{
    ExceptionAction, ExceptionMiddleware, HttpErrorMiddleware, Middleware, RequestMiddleware,
    ResponseMiddleware,
};
