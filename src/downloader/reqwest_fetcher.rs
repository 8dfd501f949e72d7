//! [`Fetcher`] implementation on top of `reqwest`.

use super::fetch::{FetchFailure, Fetcher};
use crate::error::FetchError;
use crate::proxy::ProxyOptions;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, NoProxy};
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches requests with `reqwest`, honouring each request's proxy options.
///
/// One client is built per distinct [`ProxyOptions`] and reused afterwards.
pub struct ReqwestFetcher {
    client: Client,
    proxied_clients: DashMap<ProxyOptions, Client>,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            proxied_clients: DashMap::new(),
            timeout,
        })
    }

    fn client_for(&self, request: &Request) -> Result<Client, FetchError> {
        let Some(options) = request.proxy().filter(|options| !options.is_empty()) else {
            return Ok(self.client.clone());
        };

        if let Some(client) = self.proxied_clients.get(options) {
            return Ok(client.clone());
        }

        let client = build_proxied_client(options, self.timeout)?;
        debug!("Built HTTP client for proxy options {:?}", options);
        self.proxied_clients.insert(options.clone(), client.clone());
        Ok(client)
    }
}

fn build_proxied_client(options: &ProxyOptions, timeout: Duration) -> Result<Client, FetchError> {
    let no_proxy = NoProxy::from_string(&options.excluded_domains().join(","));
    let mut builder = Client::builder().timeout(timeout).no_proxy();

    if let Some(url) = options.http() {
        let proxy = reqwest::Proxy::http(url)
            .map_err(|e| FetchError::InvalidProxy(e.to_string()))?
            .no_proxy(no_proxy.clone());
        builder = builder.proxy(proxy);
    }
    if let Some(url) = options.https() {
        let proxy = reqwest::Proxy::https(url)
            .map_err(|e| FetchError::InvalidProxy(e.to_string()))?
            .no_proxy(no_proxy);
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, FetchFailure> {
        let client = match self.client_for(&request) {
            Ok(client) => client,
            Err(error) => return Err(FetchFailure::new(request, error)),
        };

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        trace!("Fetching {}", request.url);
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(FetchFailure::new(request, e.into())),
        };

        let status = response.status();
        let headers = response.headers().clone();
        match response.bytes().await {
            Ok(body) => Ok(Response::new(request, status, headers, body)),
            Err(e) => Err(FetchFailure::new(request, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetches_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("x-crawl", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let request = Request::new(Url::parse(&format!("{}/page", server.uri())).unwrap())
            .with_header(
                http::header::HeaderName::from_static("x-crawl"),
                http::header::HeaderValue::from_static("yes"),
            )
            .with_meta("page", 1);

        let response = fetcher.fetch(request).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "<html>hello</html>");
        assert_eq!(response.meta("page"), Some(&serde_json::Value::from(1)));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let response = fetcher
            .fetch(Request::new(Url::parse(&server.uri()).unwrap()))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_connection_failure_returns_request() {
        let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(2)).unwrap();
        let request = Request::new(Url::parse("http://127.0.0.1:1/unreachable").unwrap());

        let failure = fetcher.fetch(request).await.unwrap_err();

        assert_eq!(failure.request.url.path(), "/unreachable");
        assert!(matches!(
            failure.error,
            FetchError::Connect(_) | FetchError::Http(_) | FetchError::Timeout
        ));
    }

    #[tokio::test]
    async fn test_reuses_client_per_proxy_options() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let options = ProxyOptions::all_protocols("http://127.0.0.1:3128");
        let request = Request::new(Url::parse("https://example.com").unwrap()).with_proxy(options);

        fetcher.client_for(&request).unwrap();
        fetcher.client_for(&request.clone()).unwrap();

        assert_eq!(fetcher.proxied_clients.len(), 1);
    }
}
