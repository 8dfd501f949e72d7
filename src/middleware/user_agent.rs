//! Sets the `User-Agent` header on outgoing requests.

use super::{Middleware, RequestMiddleware};
use crate::error::SpiderError;
use crate::request::Request;
use async_trait::async_trait;
use http::header::{HeaderValue, USER_AGENT};
use std::sync::Arc;

const DEFAULT_USER_AGENT: &str = concat!("spider-engine/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct UserAgentMiddleware {
    user_agent: HeaderValue,
}

impl UserAgentMiddleware {
    pub fn new(user_agent: &str) -> Result<Self, SpiderError> {
        let user_agent = HeaderValue::from_str(user_agent).map_err(|e| {
            SpiderError::ConfigurationError(format!("Invalid user agent '{}': {}", user_agent, e))
        })?;
        Ok(Self { user_agent })
    }
}

impl Default for UserAgentMiddleware {
    fn default() -> Self {
        Self {
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }
}

#[async_trait]
impl RequestMiddleware for UserAgentMiddleware {
    async fn handle_request(&self, request: Request) -> Request {
        request.with_header(USER_AGENT, self.user_agent.clone())
    }
}

impl Middleware for UserAgentMiddleware {
    fn name(&self) -> &str {
        "user_agent"
    }

    fn request_leg(self: Arc<Self>) -> Option<Arc<dyn RequestMiddleware>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_sets_header() {
        let middleware = UserAgentMiddleware::new("my-crawler/2.0").unwrap();
        let request = middleware
            .handle_request(Request::new(Url::parse("https://example.com").unwrap()))
            .await;
        assert_eq!(request.headers.get(USER_AGENT).unwrap(), "my-crawler/2.0");
    }

    #[test]
    fn test_rejects_invalid_header() {
        assert!(UserAgentMiddleware::new("bad\nagent").is_err());
    }
}
