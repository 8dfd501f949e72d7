//! Drops responses with an unsuccessful status code.

use super::{Middleware, ResponseMiddleware};
use crate::request::Droppable;
use crate::response::Response;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Drops every non-2xx response unless its status is explicitly allowed.
#[derive(Debug, Clone, Default)]
pub struct HttpErrorMiddleware {
    allowed_statuses: HashSet<u16>,
}

impl HttpErrorMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets responses with `status` through even though it is not 2xx.
    pub fn allow_status(mut self, status: u16) -> Self {
        self.allowed_statuses.insert(status);
        self
    }
}

#[async_trait]
impl ResponseMiddleware for HttpErrorMiddleware {
    async fn handle_response(&self, response: Response) -> Response {
        let status = response.status;
        if status.is_success() || self.allowed_statuses.contains(&status.as_u16()) {
            return response;
        }
        response.dropped(format!(
            "Dropped response with unsuccessful status code {}",
            status.as_u16()
        ))
    }
}

impl Middleware for HttpErrorMiddleware {
    fn name(&self) -> &str {
        "http_error"
    }

    fn response_leg(self: Arc<Self>) -> Option<Arc<dyn ResponseMiddleware>> {
        Some(self)
    }
}
