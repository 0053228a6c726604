use crate::domain::{TextContent, TextEntry, TextId};
use crate::error::ResultExt;
use crate::infrastructure::database::{DatabaseManager, Statement};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const INSERT_TEXT: &str = "
    INSERT INTO text_storage (id, content, save_flag, created_at)
    VALUES ($1, $2, $3, NOW())
";

const SELECT_TEXT_BY_ID: &str = "
    SELECT id, content, save_flag, created_at
    FROM text_storage
    WHERE id = $1
";

const DELETE_EXPIRED: &str = "
    DELETE FROM text_storage
    WHERE save_flag = false
    AND created_at < $1
";

const DELETE_TEXT_BY_ID: &str = "
    DELETE FROM text_storage
    WHERE id = $1
";

const UPDATE_SAVE_FLAG: &str = "
    UPDATE text_storage
    SET save_flag = $2
    WHERE id = $1
";

const SELECT_SAVED: &str = "
    SELECT id, content, save_flag, created_at
    FROM text_storage
    WHERE save_flag = true
    ORDER BY created_at DESC
";

/// Persistence for stored text blobs
#[derive(Clone)]
pub struct TextStorageDao {
    manager: Arc<dyn DatabaseManager>,
}

impl TextStorageDao {
    pub fn new(manager: Arc<dyn DatabaseManager>) -> Self {
        Self { manager }
    }

    /// Store new content and return its generated identifier
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn store_text(&self, content: &str, save: bool) -> Result<TextId> {
        let content = TextContent::parse(content)?;
        let id = TextId::generate();

        let statement = Statement::new(INSERT_TEXT)
            .bind(*id.as_ref())
            .bind(content.into_inner())
            .bind(save);

        self.manager
            .exec_with_retry(&statement)
            .await
            .context("failed to store text")?;

        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn get_text_by_id(&self, id: &str) -> Result<TextEntry> {
        let id = TextId::parse(id)?;
        let statement = Statement::new(SELECT_TEXT_BY_ID).bind(*id.as_ref());

        let row = self
            .manager
            .query_row_with_retry(&statement)
            .await
            .context("failed to retrieve text")?
            .ok_or_else(|| not_found(id))?;

        TextEntry::try_from(&row)
            .map_err(Error::from)
            .context("failed to retrieve text")
    }

    /// Flip the persistence flag of an existing entry
    #[instrument(skip(self))]
    pub async fn update_text_save_flag(&self, id: &str, save: bool) -> Result<()> {
        let id = TextId::parse(id)?;
        let statement = Statement::new(UPDATE_SAVE_FLAG)
            .bind(*id.as_ref())
            .bind(save);

        let affected = self
            .manager
            .exec_with_retry(&statement)
            .await
            .context("failed to update text save flag")?;

        if affected == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_text_by_id(&self, id: &str) -> Result<()> {
        let id = TextId::parse(id)?;
        let statement = Statement::new(DELETE_TEXT_BY_ID).bind(*id.as_ref());

        let affected = self
            .manager
            .exec_with_retry(&statement)
            .await
            .context("failed to delete text")?;

        if affected == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Delete unsaved entries created more than `max_age` ago
    #[instrument(skip(self))]
    pub async fn delete_expired_entries(&self, max_age: Duration) -> Result<u64> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|_| Error::validation("max_age", "is out of range"))?;
        let cutoff = Utc::now() - max_age;

        self.manager
            .exec_with_retry(&Statement::new(DELETE_EXPIRED).bind(cutoff))
            .await
            .context("failed to delete expired entries")
    }

    /// Every saved entry, newest first
    #[instrument(skip(self))]
    pub async fn get_all_saved_entries(&self) -> Result<Vec<TextEntry>> {
        let rows = self
            .manager
            .query_with_retry(&Statement::new(SELECT_SAVED))
            .await
            .context("failed to retrieve saved entries")?;

        rows.iter()
            .map(TextEntry::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
            .context("failed to retrieve saved entries")
    }
}

fn not_found(id: TextId) -> Error {
    Error::not_found(format!("text entry with ID {id}"))
}
