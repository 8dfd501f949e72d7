//! The [`Response`] produced by a fetcher for a [`Request`].

use crate::request::{Droppable, Request};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::borrow::Cow;
use url::Url;

/// A fetched page together with the request that produced it.
///
/// The drop state is independent of the request's: dropping a response does
/// not mark its request as dropped.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    request: Request,
    drop_reason: Option<String>,
}

impl Response {
    pub fn new(
        request: Request,
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Response {
            status,
            headers,
            body: body.into(),
            request,
            drop_reason: None,
        }
    }

    /// The request this response answers.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn url(&self) -> &Url {
        &self.request.url
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.request.meta(key)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl Droppable for Response {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropping_response_keeps_request_intact() {
        let request =
            Request::new(Url::parse("https://example.com/").unwrap()).with_meta("page", 1);
        let response =
            Response::new(request, StatusCode::NOT_FOUND, HeaderMap::new(), "missing");

        let response = response.dropped("404");

        assert!(response.was_dropped());
        assert!(!response.request().was_dropped());
        assert_eq!(response.meta("page"), Some(&Value::from(1)));
        assert_eq!(response.text(), "missing");
        assert_eq!(response.into_request().url.as_str(), "https://example.com/");
    }
}
