//! Composition of the HTTP layers wrapped around every route

use crate::request_logging::middleware::{request_logging_middleware, RequestLoggingState};
use axum::{middleware::from_fn_with_state, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Builder for the router's middleware stack
pub struct RequestLoggingStack {
    logging: Arc<RequestLoggingState>,
    timeout: Duration,
}

impl RequestLoggingStack {
    pub fn new(logging: Arc<RequestLoggingState>, timeout: Duration) -> Self {
        Self { logging, timeout }
    }

    /// Apply the stack to a router.
    ///
    /// Outer to inner:
    /// 1. Tracing spans
    /// 2. Request audit logging
    /// 3. Handler timeout
    ///
    /// Timed-out requests are still audited with the timeout status.
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(TimeoutLayer::new(self.timeout))
            .layer(from_fn_with_state(self.logging, request_logging_middleware))
            .layer(TraceLayer::new_for_http())
    }
}
