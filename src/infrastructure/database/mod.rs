//! Resilient access to the PostgreSQL pool
//!
//! - [`manager`]: the pooled handle plus retrying primitives
//! - [`retry`]: bounded, jittered exponential backoff with error classification
//! - [`registry`]: lock-protected lazy construction and shutdown of one manager
//! - [`statement`]: SQL text plus owned bind parameters, replayable per attempt

pub mod manager;
pub mod registry;
pub mod retry;
pub mod statement;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::{ConnectionManager, DatabaseManager};
pub use registry::{ManagerFactory, ManagerRegistry, PgManagerFactory};
pub use retry::{is_transient, MaxAttempts, RetryPolicy};
pub use statement::{SqlParam, Statement};
