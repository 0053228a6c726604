use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

/// Audit details of one HTTP transaction, as captured by the middleware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub content_type: String,
    /// Possibly redacted or truncated request body
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub request_body: String,
    /// Raw query string, without the leading `?`
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub query_params: String,
    pub response_status: u16,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub user_agent: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ip_address: String,
}

/// A persisted request log with its store-assigned identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: i64,
    #[serde(flatten)]
    pub record: RequestLogRecord,
}

fn optional_text(row: &PgRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

impl TryFrom<&PgRow> for RequestLog {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        let status: i32 = row.try_get("response_status")?;
        let response_time_ms: i64 = row.try_get("response_time_ms")?;

        Ok(Self {
            id: row.try_get("id")?,
            record: RequestLogRecord {
                timestamp: row.try_get("timestamp")?,
                endpoint: row.try_get("endpoint")?,
                method: row.try_get("method")?,
                content_type: optional_text(row, "content_type")?,
                request_body: optional_text(row, "request_body")?,
                query_params: optional_text(row, "query_params")?,
                response_status: u16::try_from(status).unwrap_or_default(),
                response_time_ms: u64::try_from(response_time_ms).unwrap_or_default(),
                user_agent: optional_text(row, "user_agent")?,
                ip_address: optional_text(row, "ip_address")?,
            },
        })
    }
}
