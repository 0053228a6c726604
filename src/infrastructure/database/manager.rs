use crate::config::DatabaseSettings;
use crate::infrastructure::database::{RetryPolicy, Statement};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};

/// Capability contract of a connection manager.
///
/// DAOs depend on this trait rather than on [`ConnectionManager`] so they can
/// run against any implementation, including in-memory fakes.
#[async_trait]
pub trait DatabaseManager: Send + Sync {
    /// Execute a statement, returning the number of affected rows
    async fn exec_with_retry(&self, statement: &Statement) -> Result<u64>;

    /// Fetch every row produced by a statement
    async fn query_with_retry(&self, statement: &Statement) -> Result<Vec<PgRow>>;

    /// Fetch at most one row
    async fn query_row_with_retry(&self, statement: &Statement) -> Result<Option<PgRow>>;

    async fn begin_transaction(&self) -> Result<Transaction<'static, Postgres>>;

    /// Verify connectivity, retrying transient failures
    async fn ping(&self) -> Result<()>;

    /// Release the pooled connections
    async fn close(&self) -> Result<()>;
}

/// Pooled PostgreSQL handle with retrying primitives
pub struct ConnectionManager {
    pool: PgPool,
    retry: RetryPolicy,
}

impl ConnectionManager {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Open the pool and verify connectivity before handing it out.
    ///
    /// Connections are established lazily; the initial ping is what actually
    /// reaches the server. On failure the pool is closed again.
    #[instrument(skip(settings, retry), fields(host = %settings.host, port = settings.port, database = %settings.name))]
    pub async fn connect(settings: &DatabaseSettings, retry: RetryPolicy) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .max_lifetime(settings.max_lifetime())
            .idle_timeout(settings.idle_timeout())
            .acquire_timeout(settings.acquire_timeout())
            .connect_lazy_with(settings.connect_options()?);

        let manager = Self::new(pool, retry);
        if let Err(e) = manager.ping().await {
            manager.pool.close().await;
            return Err(Error::Construction(format!("failed to connect to database: {e}")));
        }

        info!("Database connection established");
        Ok(manager)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

#[async_trait]
impl DatabaseManager for ConnectionManager {
    async fn exec_with_retry(&self, statement: &Statement) -> Result<u64> {
        let pool = &self.pool;
        self.retry
            .run("execute query", move || async move {
                statement
                    .query()
                    .execute(pool)
                    .await
                    .map(|done| done.rows_affected())
            })
            .await
    }

    async fn query_with_retry(&self, statement: &Statement) -> Result<Vec<PgRow>> {
        let pool = &self.pool;
        self.retry
            .run("run query", move || async move {
                statement.query().fetch_all(pool).await
            })
            .await
    }

    async fn query_row_with_retry(&self, statement: &Statement) -> Result<Option<PgRow>> {
        let pool = &self.pool;
        self.retry
            .run("run single-row query", move || async move {
                statement.query().fetch_optional(pool).await
            })
            .await
    }

    async fn begin_transaction(&self) -> Result<Transaction<'static, Postgres>> {
        let pool = &self.pool;
        self.retry
            .run("begin transaction", move || async move { pool.begin().await })
            .await
    }

    async fn ping(&self) -> Result<()> {
        let pool = &self.pool;
        self.retry
            .run("ping database", move || async move {
                sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
            })
            .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
