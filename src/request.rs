//! # Request Module
//!
//! Defines the [`Request`] value that flows through the scheduler, the
//! request leg of the middleware chain and the fetcher, plus the
//! [`Droppable`] contract shared with [`Response`](crate::response::Response).
//!
//! Requests are values: every mutator consumes the request and hands back the
//! modified one, so a middleware that wants to keep the original clones it
//! first. Once a request has been dropped it stays dropped.

use crate::proxy::ProxyOptions;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

/// Terminal, non-error rejection of a value travelling through the pipeline.
pub trait Droppable: Sized {
    /// Returns the value marked as dropped with `reason`.
    ///
    /// Dropping a value that is already dropped keeps the original reason.
    fn dropped(self, reason: impl Into<String>) -> Self;

    /// Whether the value has been dropped.
    fn was_dropped(&self) -> bool {
        self.drop_reason().is_some()
    }

    /// The reason given when the value was dropped.
    fn drop_reason(&self) -> Option<&str>;
}

/// A single HTTP request scheduled by a spider.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    callback: Option<String>,
    meta: HashMap<String, Value>,
    proxy: Option<ProxyOptions>,
    drop_reason: Option<String>,
}

impl Request {
    /// Creates a `GET` request for `url`.
    pub fn new(url: Url) -> Self {
        Self::with_method(Method::GET, url)
    }

    pub fn with_method(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            callback: None,
            meta: HashMap::new(),
            proxy: None,
            drop_reason: None,
        }
    }

    /// The host the request targets, if the URL has one.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Identifier of the spider callback that should handle the response.
    pub fn callback(&self) -> Option<&str> {
        self.callback.as_deref()
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Proxy options assigned to this request, if any.
    pub fn proxy(&self) -> Option<&ProxyOptions> {
        self.proxy.as_ref()
    }

    pub fn with_proxy(mut self, options: ProxyOptions) -> Self {
        self.proxy = Some(options);
        self
    }

    /// Identity of the request for duplicate detection: method plus the URL
    /// without its fragment.
    pub fn fingerprint(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("{} {}", self.method, url)
    }
}

impl Droppable for Request {
    fn dropped(mut self, reason: impl Into<String>) -> Self {
        if self.drop_reason.is_none() {
            self.drop_reason = Some(reason.into());
        }
        self
    }

    fn drop_reason(&self) -> Option<&str> {
        self.drop_reason.as_deref()
    }
}
