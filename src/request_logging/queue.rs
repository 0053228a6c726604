//! Bounded hand-off between request handlers and the log writer workers

use crate::domain::RequestLogRecord;
use crossbeam::queue::ArrayQueue;
use nutype::nutype;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::warn;

/// Maximum number of records waiting to be persisted
#[nutype(
    validate(predicate = |capacity: &usize| *capacity > 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct QueueCapacity(usize);

/// Snapshot of queue activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub dropped: u64,
    pub pending: usize,
}

/// Lock-free bounded queue of audit records.
///
/// `submit` never blocks and never allocates a task: when the queue is full
/// the new record is dropped and counted.
pub struct RequestLogQueue {
    queue: ArrayQueue<RequestLogRecord>,
    ready: Notify,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl RequestLogQueue {
    pub fn new(capacity: QueueCapacity) -> Self {
        Self {
            queue: ArrayQueue::new(*capacity.as_ref()),
            ready: Notify::new(),
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a record for persistence; returns false if it was dropped
    pub fn submit(&self, record: RequestLogRecord) -> bool {
        match self.queue.push(record) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
                self.ready.notify_one();
                true
            }
            Err(rejected) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Log sparsely under sustained overload
                if dropped.is_power_of_two() {
                    warn!(
                        dropped,
                        endpoint = %rejected.endpoint,
                        "Request log queue full, dropping record"
                    );
                }
                false
            }
        }
    }

    pub(crate) fn pop(&self) -> Option<RequestLogRecord> {
        self.queue.pop()
    }

    /// Resolves once a record has been submitted since the last wake-up
    pub(crate) fn notified(&self) -> Notified<'_> {
        self.ready.notified()
    }

    pub(crate) fn wake_all(&self) {
        self.ready.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.queue.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(endpoint: &str) -> RequestLogRecord {
        RequestLogRecord {
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            method: "GET".to_string(),
            content_type: String::new(),
            request_body: String::new(),
            query_params: String::new(),
            response_status: 200,
            response_time_ms: 1,
            user_agent: String::new(),
            ip_address: String::new(),
        }
    }

    fn queue(capacity: usize) -> RequestLogQueue {
        RequestLogQueue::new(QueueCapacity::try_new(capacity).unwrap())
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        assert!(QueueCapacity::try_new(0).is_err());
    }

    #[test]
    fn test_submit_and_pop_in_order() {
        let queue = queue(4);

        assert!(queue.submit(record("/a")));
        assert!(queue.submit(record("/b")));

        assert_eq!(queue.pop().unwrap().endpoint, "/a");
        assert_eq!(queue.pop().unwrap().endpoint, "/b");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let queue = queue(2);

        assert!(queue.submit(record("/1")));
        assert!(queue.submit(record("/2")));
        assert!(!queue.submit(record("/3")));
        assert!(!queue.submit(record("/4")));

        let stats = queue.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.pending, 2);

        // The oldest records are kept
        assert_eq!(queue.pop().unwrap().endpoint, "/1");
    }

    #[tokio::test]
    async fn test_submit_wakes_a_waiting_consumer() {
        let queue = std::sync::Arc::new(queue(4));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue.notified().await;
                queue.pop()
            })
        };

        tokio::task::yield_now().await;
        queue.submit(record("/wake"));

        let popped = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.unwrap().endpoint, "/wake");
    }
}
