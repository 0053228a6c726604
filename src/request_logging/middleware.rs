//! Request audit middleware
//!
//! Every request that is not on the skip list is observed on its way through
//! the router and handed to the [`RequestLogQueue`] once the response exists.
//! The handler's response is returned untouched; persistence happens on the
//! writer workers.

use crate::config::RequestLoggingSettings;
use crate::domain::RequestLogRecord;
use crate::request_logging::headers::{
    paths, CONTENT_TYPE, REDACTED_BODY, USER_AGENT, X_FORWARDED_FOR, X_REAL_IP,
};
use crate::request_logging::queue::RequestLogQueue;
use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runtime switches for the audit middleware
#[derive(Clone, Debug)]
pub struct RequestLoggingConfig {
    pub enabled: bool,
    /// Path prefixes that are never recorded
    pub skip_prefixes: Vec<String>,
    /// Path fragments whose request bodies are replaced by [`REDACTED_BODY`]
    pub redact_patterns: Vec<String>,
    /// Captured bodies are truncated to this many bytes; nothing past them
    /// is buffered by the middleware
    pub max_body_bytes: usize,
    /// Upper bound on the time spent capturing the body prefix
    pub body_read_timeout: Duration,
}

impl Default for RequestLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_prefixes: vec![paths::HEALTH.to_string(), paths::STATIC.to_string()],
            redact_patterns: vec![paths::AUTH.to_string(), paths::LOGIN.to_string()],
            max_body_bytes: 64 * 1024,
            body_read_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&RequestLoggingSettings> for RequestLoggingConfig {
    fn from(settings: &RequestLoggingSettings) -> Self {
        Self {
            enabled: settings.enabled,
            skip_prefixes: settings.skip_prefixes.clone(),
            redact_patterns: settings.redact_patterns.clone(),
            max_body_bytes: settings.max_body_bytes,
            ..Self::default()
        }
    }
}

impl RequestLoggingConfig {
    pub fn with_body_read_timeout(mut self, timeout: Duration) -> Self {
        self.body_read_timeout = timeout;
        self
    }

    pub fn should_skip(&self, path: &str) -> bool {
        self.skip_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn should_redact(&self, path: &str) -> bool {
        self.redact_patterns
            .iter()
            .any(|pattern| path.contains(pattern.as_str()))
    }

    /// The body as it may be stored for `path`
    pub fn sanitize_body(&self, body: String, path: &str) -> String {
        if self.should_redact(path) {
            REDACTED_BODY.to_string()
        } else {
            body
        }
    }

    fn capture_body(&self, bytes: &[u8]) -> String {
        let end = bytes.len().min(self.max_body_bytes);
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }
}

/// Shared state for [`request_logging_middleware`]
pub struct RequestLoggingState {
    config: RequestLoggingConfig,
    queue: Arc<RequestLogQueue>,
}

impl RequestLoggingState {
    pub fn new(config: RequestLoggingConfig, queue: Arc<RequestLogQueue>) -> Self {
        Self { config, queue }
    }

    pub fn config(&self) -> &RequestLoggingConfig {
        &self.config
    }
}

/// Records one audit entry per request without delaying the response
pub async fn request_logging_middleware(
    State(state): State<Arc<RequestLoggingState>>,
    request: Request,
    next: Next,
) -> Response {
    let config = &state.config;
    if !config.enabled || config.should_skip(request.uri().path()) {
        return next.run(request).await;
    }

    let timestamp = Utc::now();
    let start = Instant::now();

    let method = request.method().clone();
    let endpoint = request.uri().path().to_string();
    let query_params = request.uri().query().unwrap_or_default().to_string();
    let content_type = header_value(request.headers(), CONTENT_TYPE.as_str());
    let user_agent = header_value(request.headers(), USER_AGENT.as_str());
    let ip_address = client_ip(&request);

    let (request, request_body) = if method == Method::GET || method == Method::HEAD {
        (request, String::new())
    } else {
        let (parts, body) = request.into_parts();
        let (body, captured) = capture_prefix(config, body, &endpoint).await;
        (Request::from_parts(parts, body), captured)
    };

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let record = RequestLogRecord {
        timestamp,
        request_body: config.sanitize_body(request_body, &endpoint),
        endpoint,
        method: method.to_string(),
        content_type,
        query_params,
        response_status: response.status().as_u16(),
        response_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        user_agent,
        ip_address,
    };

    if state.queue.submit(record) {
        debug!(status = response.status().as_u16(), "Request log queued");
    }

    response
}

/// How the prefix read ended
enum PrefixEnd {
    /// The whole body was read
    Complete,
    /// The capture limit was reached; the rest is still unread
    Limit,
    TimedOut,
    Failed(axum::Error),
}

/// Read up to `max_body_bytes` of `body` and hand back an equivalent body.
///
/// Whatever was read is replayed ahead of the unread remainder, and a read
/// error is replayed to the handler in place, so the wrapped route observes
/// the same body it would have without the middleware.
async fn capture_prefix(
    config: &RequestLoggingConfig,
    mut body: Body,
    endpoint: &str,
) -> (Body, String) {
    let mut chunks = Vec::new();
    let end = match tokio::time::timeout(
        config.body_read_timeout,
        read_prefix(&mut body, config.max_body_bytes, &mut chunks),
    )
    .await
    {
        Ok(end) => end,
        Err(_) => {
            warn!(endpoint, "Request body capture timed out; logging partial body");
            PrefixEnd::TimedOut
        }
    };

    let read = Bytes::from(chunks.concat());
    let captured = config.capture_body(&read);
    let prefix = stream::iter([Ok::<Bytes, axum::Error>(read.clone())]);

    let body = match end {
        PrefixEnd::Complete => Body::from(read),
        PrefixEnd::Limit | PrefixEnd::TimedOut => {
            Body::from_stream(prefix.chain(body.into_data_stream()))
        }
        PrefixEnd::Failed(e) => {
            warn!(endpoint, error = %e, "Failed to read request body");
            Body::from_stream(prefix.chain(stream::once(async move { Err(e) })))
        }
    };

    (body, captured)
}

async fn read_prefix(body: &mut Body, limit: usize, chunks: &mut Vec<Bytes>) -> PrefixEnd {
    let mut read = 0;
    while read < limit {
        match body.frame().await {
            None => return PrefixEnd::Complete,
            Some(Ok(frame)) => {
                // Trailers are not part of the logged body
                if let Ok(data) = frame.into_data() {
                    read += data.len();
                    chunks.push(data);
                }
            }
            Some(Err(e)) => return PrefixEnd::Failed(e),
        }
    }

    if body.is_end_stream() {
        PrefixEnd::Complete
    } else {
        PrefixEnd::Limit
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// First X-Forwarded-For entry, else X-Real-IP, else the peer address
fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    if let Some(first) = headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    let real_ip = header_value(headers, X_REAL_IP);
    if !real_ip.is_empty() {
        return real_ip;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}
