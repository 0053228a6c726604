//! Test doubles for the request logging pipeline

use crate::domain::RequestLogRecord;
use crate::request_logging::{
    QueueCapacity, RequestLogQueue, RequestLogSink, RequestLogWriter, RequestLoggingConfig,
    RequestLoggingStack, RequestLoggingState, WorkerCount,
};
use crate::{Error, Result};
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{Request, Response, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::ServiceExt;

/// Collects persisted records in memory.
///
/// A gated sink blocks every `persist` until a permit is released.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<RequestLogRecord>>,
    gate: Option<Semaphore>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn records(&self) -> Vec<RequestLogRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Poll until `count` records have been persisted
    pub async fn wait_for(&self, count: usize) -> Vec<RequestLogRecord> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let records = self.records();
                if records.len() >= count {
                    return records;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("records should be persisted in time")
    }
}

#[async_trait]
impl RequestLogSink for MemorySink {
    async fn persist(&self, record: RequestLogRecord) -> Result<()> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

pub fn record(endpoint: &str) -> RequestLogRecord {
    RequestLogRecord {
        timestamp: chrono::Utc::now(),
        endpoint: endpoint.to_string(),
        method: "POST".to_string(),
        content_type: String::new(),
        request_body: String::new(),
        query_params: String::new(),
        response_status: 200,
        response_time_ms: 0,
        user_agent: String::new(),
        ip_address: String::new(),
    }
}

pub fn queue(capacity: usize) -> Arc<RequestLogQueue> {
    Arc::new(RequestLogQueue::new(QueueCapacity::try_new(capacity).unwrap()))
}

/// Router with the full middleware stack feeding a live writer
pub struct MiddlewareTestHarness {
    router: Router,
    pub sink: Arc<MemorySink>,
    pub writer: RequestLogWriter,
}

impl MiddlewareTestHarness {
    pub fn new(config: RequestLoggingConfig) -> Self {
        Self::with_sink(config, Arc::new(MemorySink::new()))
    }

    pub fn with_sink(config: RequestLoggingConfig, sink: Arc<MemorySink>) -> Self {
        let queue = queue(64);
        let writer = RequestLogWriter::start(
            Arc::clone(&queue),
            sink.clone(),
            WorkerCount::try_new(2).unwrap(),
        );
        let state = Arc::new(RequestLoggingState::new(config, queue));

        let router = Router::new()
            .route("/texts", get(|| async { "listing" }))
            .route("/echo", post(echo_handler))
            .route("/login", post(echo_handler))
            .route("/upload", post(|| async { StatusCode::ACCEPTED }))
            .route("/health", get(|| async { "ok" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));
        let router = RequestLoggingStack::new(state, Duration::from_secs(5)).apply_to_router(router);

        Self {
            router,
            sink,
            writer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str) -> Response<Body> {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, path: &str, body: &'static str) -> Response<Body> {
        self.send(
            Request::post(path)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

async fn echo_handler(body: Bytes) -> Bytes {
    body
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
