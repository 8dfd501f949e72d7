//! The fetch capability the downloader dispatches requests through.

use crate::error::FetchError;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;

/// A request whose fetch failed at the transport level.
#[derive(Debug)]
pub struct FetchFailure {
    pub request: Request,
    pub error: FetchError,
}

impl FetchFailure {
    pub fn new(request: Request, error: FetchError) -> Self {
        Self { request, error }
    }
}

/// Performs the network transport for one request.
///
/// Implementations must be safe to call concurrently: the downloader runs up
/// to its concurrency limit of fetches at once.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, request: Request) -> Result<Response, FetchFailure>;
}
