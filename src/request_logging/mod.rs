//! Asynchronous HTTP request audit logging
//!
//! The middleware builds a [`RequestLogRecord`](crate::domain::RequestLogRecord)
//! for each request and submits it to a bounded [`RequestLogQueue`]. A fixed
//! pool of [`RequestLogWriter`] workers drains the queue into a
//! [`RequestLogSink`]. When the queue is full new records are dropped and
//! counted rather than delaying the response.

pub mod headers;
pub mod middleware;
pub mod middleware_stack;
pub mod queue;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use middleware::{request_logging_middleware, RequestLoggingConfig, RequestLoggingState};
pub use middleware_stack::RequestLoggingStack;
pub use queue::{QueueCapacity, QueueStats, RequestLogQueue};
pub use writer::{PipelineStats, RequestLogSink, RequestLogWriter, WorkerCount};
