//! Ordered middleware chains, one per leg.
//!
//! The manager resolves which legs each middleware supports when it is built
//! and keeps a separate chain per leg, so dispatch never has to ask a
//! middleware what it implements.

use super::{
    ExceptionAction, ExceptionMiddleware, Middleware, RequestMiddleware, ResponseMiddleware,
};
use crate::downloader::FetchFailure;
use crate::request::{Droppable, Request};
use crate::response::Response;
use std::sync::Arc;
use tracing::{debug, trace};

struct Stage<L: ?Sized> {
    name: String,
    leg: Arc<L>,
}

/// Immutable set of middleware chains.
pub struct MiddlewareManager {
    request_stages: Vec<Stage<dyn RequestMiddleware>>,
    response_stages: Vec<Stage<dyn ResponseMiddleware>>,
    exception_stages: Vec<Stage<dyn ExceptionMiddleware>>,
}

impl MiddlewareManager {
    /// Creates a manager from middlewares in registration order.
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        let mut request_stages = Vec::new();
        let mut response_stages = Vec::new();
        let mut exception_stages = Vec::new();

        for middleware in middlewares {
            let name = middleware.name().to_string();
            if let Some(leg) = Arc::clone(&middleware).request_leg() {
                request_stages.push(Stage {
                    name: name.clone(),
                    leg,
                });
            }
            if let Some(leg) = Arc::clone(&middleware).response_leg() {
                response_stages.push(Stage {
                    name: name.clone(),
                    leg,
                });
            }
            if let Some(leg) = middleware.exception_leg() {
                exception_stages.push(Stage { name, leg });
            }
        }

        debug!(
            "Middleware chains registered: {} request, {} response, {} exception",
            request_stages.len(),
            response_stages.len(),
            exception_stages.len()
        );

        Self {
            request_stages,
            response_stages,
            exception_stages,
        }
    }

    /// Runs the request leg. Stops at the first stage that drops the request.
    pub async fn process_request(&self, request: Request) -> Request {
        let mut current_request = request;

        for stage in &self.request_stages {
            trace!("Request middleware '{}' handling {}", stage.name, current_request.url);
            current_request = stage.leg.handle_request(current_request).await;
            if current_request.was_dropped() {
                debug!(
                    "Request dropped by middleware '{}' for URL {}: {}",
                    stage.name,
                    current_request.url,
                    current_request.drop_reason().unwrap_or_default()
                );
                break;
            }
        }

        current_request
    }

    /// Runs the response leg. Stops at the first stage that drops the response.
    pub async fn process_response(&self, response: Response) -> Response {
        let mut current_response = response;

        for stage in &self.response_stages {
            trace!("Response middleware '{}' handling {}", stage.name, current_response.url());
            current_response = stage.leg.handle_response(current_response).await;
            if current_response.was_dropped() {
                debug!(
                    "Response dropped by middleware '{}' for URL {}: {}",
                    stage.name,
                    current_response.url(),
                    current_response.drop_reason().unwrap_or_default()
                );
                break;
            }
        }

        current_response
    }

    /// Runs the exception leg. Stops at the first stage that settles the failure.
    ///
    /// Returns [`ExceptionAction::Continue`] when no stage settled it.
    pub async fn process_exception(&self, failure: FetchFailure) -> ExceptionAction {
        let mut current_failure = failure;

        for stage in &self.exception_stages {
            trace!(
                "Exception middleware '{}' handling {}",
                stage.name, current_failure.request.url
            );
            match stage.leg.handle_exception(current_failure).await {
                ExceptionAction::Continue(failure) => current_failure = failure,
                action => {
                    debug!("Exception settled by middleware '{}'", stage.name);
                    return action;
                }
            }
        }

        ExceptionAction::Continue(current_failure)
    }

    pub fn is_empty(&self) -> bool {
        self.request_stages.is_empty()
            && self.response_stages.is_empty()
            && self.exception_stages.is_empty()
    }
}
