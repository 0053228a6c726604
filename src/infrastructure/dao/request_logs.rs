use crate::domain::{PageLimit, RequestLog, RequestLogRecord};
use crate::error::ResultExt;
use crate::infrastructure::database::{DatabaseManager, Statement};
use crate::{Error, Result};
use sqlx::Row;
use std::sync::Arc;
use tracing::instrument;

const INSERT_REQUEST_LOG: &str = "
    INSERT INTO request_logs (
        timestamp, endpoint, method, content_type, request_body,
        query_params, response_status, response_time_ms, user_agent, ip_address
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    RETURNING id
";

const SELECT_REQUEST_LOGS: &str = "
    SELECT
        id, timestamp, endpoint, method, content_type,
        request_body, query_params, response_status, response_time_ms,
        user_agent, ip_address
    FROM request_logs
    ORDER BY timestamp DESC
    LIMIT $1 OFFSET $2
";

const DELETE_OLD_REQUEST_LOGS: &str = "
    DELETE FROM request_logs
    WHERE timestamp < NOW() - make_interval(days => $1)
";

const COUNT_REQUEST_LOGS: &str = "SELECT COUNT(*) AS count FROM request_logs";

/// Persistence for HTTP request audit records
#[derive(Clone)]
pub struct RequestLogDao {
    manager: Arc<dyn DatabaseManager>,
}

impl RequestLogDao {
    pub fn new(manager: Arc<dyn DatabaseManager>) -> Self {
        Self { manager }
    }

    /// Insert one record, returning the store-assigned identifier
    #[instrument(skip(self, record), fields(endpoint = %record.endpoint, status = record.response_status))]
    pub async fn insert_request_log(&self, record: &RequestLogRecord) -> Result<i64> {
        let statement = Statement::new(INSERT_REQUEST_LOG)
            .bind(record.timestamp)
            .bind(record.endpoint.as_str())
            .bind(record.method.as_str())
            .bind(record.content_type.as_str())
            .bind(record.request_body.as_str())
            .bind(record.query_params.as_str())
            .bind(i32::from(record.response_status))
            .bind(i64::try_from(record.response_time_ms).unwrap_or(i64::MAX))
            .bind(record.user_agent.as_str())
            .bind(record.ip_address.as_str());

        let row = self
            .manager
            .query_row_with_retry(&statement)
            .await
            .context("failed to insert request log")?
            .ok_or(Error::Database(sqlx::Error::RowNotFound))
            .context("failed to insert request log")?;

        row.try_get::<i64, _>("id")
            .map_err(Error::from)
            .context("failed to insert request log")
    }

    /// A page of records, most recent first
    #[instrument(skip(self))]
    pub async fn get_request_logs(&self, limit: u32, offset: u32) -> Result<Vec<RequestLog>> {
        let limit = PageLimit::parse(limit)?;
        let statement = Statement::new(SELECT_REQUEST_LOGS)
            .bind(i64::from(*limit.as_ref()))
            .bind(i64::from(offset));

        let rows = self
            .manager
            .query_with_retry(&statement)
            .await
            .context("failed to query request logs")?;

        rows.iter()
            .map(RequestLog::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
            .context("failed to scan request log row")
    }

    /// Delete records older than `days` days, returning how many were removed
    #[instrument(skip(self))]
    pub async fn delete_old_request_logs(&self, days: u32) -> Result<u64> {
        let days = i32::try_from(days).map_err(|_| Error::validation("days", "is out of range"))?;

        self.manager
            .exec_with_retry(&Statement::new(DELETE_OLD_REQUEST_LOGS).bind(days))
            .await
            .context("failed to delete old request logs")
    }

    #[instrument(skip(self))]
    pub async fn count_request_logs(&self) -> Result<u64> {
        let count = match self
            .manager
            .query_row_with_retry(&Statement::new(COUNT_REQUEST_LOGS))
            .await
            .context("failed to count request logs")?
        {
            Some(row) => row
                .try_get::<i64, _>("count")
                .map_err(Error::from)
                .context("failed to count request logs")?,
            None => 0,
        };

        Ok(u64::try_from(count).unwrap_or_default())
    }
}
