//! Assigns per-host proxy options to outgoing requests.

use super::{Middleware, RequestMiddleware};
use crate::error::SpiderError;
use crate::proxy::Proxy;
use crate::request::Request;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Attaches the options resolved by a [`Proxy`] registry to each request.
///
/// Requests whose host appears in the matched options' exclusion list are
/// left without a proxy.
#[derive(Debug, Clone)]
pub struct ProxyMiddleware {
    proxy: Arc<Proxy>,
}

impl ProxyMiddleware {
    pub fn new(proxy: Arc<Proxy>) -> Self {
        Self { proxy }
    }

    pub fn from_value(config: Value) -> Result<Self, SpiderError> {
        Ok(Self::new(Arc::new(Proxy::from_value(config)?)))
    }
}

#[async_trait]
impl RequestMiddleware for ProxyMiddleware {
    async fn handle_request(&self, request: Request) -> Request {
        let options = self.proxy.options_for(&request);
        if options.is_empty() {
            return request;
        }
        if request.host().is_some_and(|host| options.excludes(host)) {
            trace!("Host excluded from proxy: {}", request.url);
            return request;
        }
        request.with_proxy(options)
    }
}

impl Middleware for ProxyMiddleware {
    fn name(&self) -> &str {
        "proxy"
    }

    fn request_leg(self: Arc<Self>) -> Option<Arc<dyn RequestMiddleware>> {
        Some(self)
    }
}
