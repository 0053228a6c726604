use crate::domain::types::TextId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

/// A stored text blob
///
/// Content is immutable after creation; only `save` can change. Entries with
/// `save == false` are eligible for the age-based expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub id: TextId,
    pub content: String,
    pub save: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&PgRow> for TextEntry {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TextId::new(row.try_get("id")?),
            content: row.try_get("content")?,
            save: row.try_get("save_flag")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
