//! Background workers that drain the request log queue into storage

use crate::domain::RequestLogRecord;
use crate::infrastructure::RequestLogDao;
use crate::request_logging::queue::RequestLogQueue;
use crate::Result;
use async_trait::async_trait;
use nutype::nutype;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Destination for drained records
#[async_trait]
pub trait RequestLogSink: Send + Sync {
    async fn persist(&self, record: RequestLogRecord) -> Result<()>;
}

#[async_trait]
impl RequestLogSink for RequestLogDao {
    async fn persist(&self, record: RequestLogRecord) -> Result<()> {
        self.insert_request_log(&record).await.map(|_| ())
    }
}

#[nutype(
    validate(predicate = |count: &usize| *count > 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct WorkerCount(usize);

/// Counters across the whole pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub submitted: u64,
    pub dropped: u64,
    pub persisted: u64,
    pub failed: u64,
    pub pending: usize,
}

#[derive(Default)]
struct WriterCounters {
    persisted: AtomicU64,
    failed: AtomicU64,
}

/// Fixed pool of workers persisting queued records.
///
/// Persistence failures are logged and counted, never surfaced to the
/// request that produced the record.
pub struct RequestLogWriter {
    queue: Arc<RequestLogQueue>,
    counters: Arc<WriterCounters>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl RequestLogWriter {
    /// Spawn `workers` tasks on the current runtime
    pub fn start(
        queue: Arc<RequestLogQueue>,
        sink: Arc<dyn RequestLogSink>,
        workers: WorkerCount,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(WriterCounters::default());

        let workers = (0..*workers.as_ref())
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&queue),
                    Arc::clone(&sink),
                    Arc::clone(&counters),
                    shutdown_rx.clone(),
                ))
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), "Request log writer started");

        Self {
            queue,
            counters,
            shutdown_tx,
            workers,
        }
    }

    pub fn queue(&self) -> &Arc<RequestLogQueue> {
        &self.queue
    }

    pub fn stats(&self) -> PipelineStats {
        let queue = self.queue.stats();
        PipelineStats {
            submitted: queue.submitted,
            dropped: queue.dropped,
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            pending: queue.pending,
        }
    }

    /// Stop the workers after they drain whatever is already queued
    pub async fn shutdown(mut self) -> PipelineStats {
        let _ = self.shutdown_tx.send(true);
        self.queue.wake_all();

        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Request log worker panicked");
            }
        }

        let stats = self.stats();
        info!(
            persisted = stats.persisted,
            failed = stats.failed,
            dropped = stats.dropped,
            "Request log writer stopped"
        );
        stats
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<RequestLogQueue>,
    sink: Arc<dyn RequestLogSink>,
    counters: Arc<WriterCounters>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker, "Request log worker started");

    loop {
        while let Some(record) = queue.pop() {
            let endpoint = record.endpoint.clone();
            match sink.persist(record).await {
                Ok(()) => {
                    counters.persisted.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(worker, endpoint = %endpoint, error = %e, "Failed to log request");
                }
            }
        }

        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            () = queue.notified() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(worker, "Request log worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_logging::test_helpers::{queue, record, MemorySink};

    fn workers(count: usize) -> WorkerCount {
        WorkerCount::try_new(count).unwrap()
    }

    #[test]
    fn test_zero_workers_is_invalid() {
        assert!(WorkerCount::try_new(0).is_err());
    }

    #[tokio::test]
    async fn test_workers_persist_submitted_records() {
        let queue = queue(16);
        let sink = Arc::new(MemorySink::new());
        let writer = RequestLogWriter::start(Arc::clone(&queue), sink.clone(), workers(2));

        for i in 0..5 {
            assert!(queue.submit(record(&format!("/r/{i}"))));
        }

        assert_eq!(sink.wait_for(5).await.len(), 5);
        let stats = writer.shutdown().await;
        assert_eq!(stats.persisted, 5);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_records() {
        let queue = queue(16);
        let sink = Arc::new(MemorySink::gated());
        let writer = RequestLogWriter::start(Arc::clone(&queue), sink.clone(), workers(1));

        for i in 0..3 {
            queue.submit(record(&format!("/r/{i}")));
        }
        sink.release(3);

        let stats = writer.shutdown().await;
        assert_eq!(stats.persisted, 3);
        assert_eq!(sink.records().len(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_propagated() {
        let queue = queue(4);
        let writer =
            RequestLogWriter::start(Arc::clone(&queue), Arc::new(MemorySink::failing()), workers(1));

        queue.submit(record("/a"));
        queue.submit(record("/b"));

        let stats = writer.shutdown().await;
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.persisted, 0);
    }

    #[tokio::test]
    async fn test_overflow_while_sink_is_blocked_is_dropped() {
        let queue = queue(2);
        let sink = Arc::new(MemorySink::gated());
        let writer = RequestLogWriter::start(Arc::clone(&queue), sink.clone(), workers(1));

        // First record is taken by the worker and parked on the gate
        queue.submit(record("/0"));
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !queue.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(queue.submit(record("/1")));
        assert!(queue.submit(record("/2")));
        assert!(!queue.submit(record("/3")));

        sink.release(3);
        let stats = writer.shutdown().await;
        assert_eq!(stats.persisted, 3);
        assert_eq!(stats.dropped, 1);
    }
}
