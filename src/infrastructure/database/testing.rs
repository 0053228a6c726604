//! In-memory stand-ins for the connection manager

use crate::infrastructure::database::{DatabaseManager, Statement};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Transaction};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Records every statement and answers with canned results.
///
/// Row-returning queries always come back empty because `PgRow` cannot be
/// built outside a live connection.
#[derive(Default)]
pub struct RecordingManager {
    statements: Mutex<Vec<Statement>>,
    rows_affected: AtomicU64,
    fail_with_timeout: AtomicBool,
    closed: AtomicBool,
}

impl RecordingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows_affected(self, rows: u64) -> Self {
        self.rows_affected.store(rows, Ordering::SeqCst);
        self
    }

    /// Every primitive fails as if the retry budget was spent
    pub fn failing(self) -> Self {
        self.fail_with_timeout.store(true, Ordering::SeqCst);
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, statement: &Statement, operation: &'static str) -> Result<()> {
        self.statements.lock().unwrap().push(statement.clone());
        if self.fail_with_timeout.load(Ordering::SeqCst) {
            return Err(Error::Transient {
                operation,
                attempts: 3,
                source: sqlx::Error::PoolTimedOut,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseManager for RecordingManager {
    async fn exec_with_retry(&self, statement: &Statement) -> Result<u64> {
        self.record(statement, "execute query")?;
        Ok(self.rows_affected.load(Ordering::SeqCst))
    }

    async fn query_with_retry(&self, statement: &Statement) -> Result<Vec<PgRow>> {
        self.record(statement, "run query")?;
        Ok(Vec::new())
    }

    async fn query_row_with_retry(&self, statement: &Statement) -> Result<Option<PgRow>> {
        self.record(statement, "run single-row query")?;
        Ok(None)
    }

    async fn begin_transaction(&self) -> Result<Transaction<'static, Postgres>> {
        Err(Error::Database(sqlx::Error::PoolClosed))
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_with_timeout.load(Ordering::SeqCst) {
            return Err(Error::Transient {
                operation: "ping database",
                attempts: 3,
                source: sqlx::Error::PoolTimedOut,
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
