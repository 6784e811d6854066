use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sastra_models::Note;
use sqlx::SqlitePool;

/// Notes, one per `toc_url`.
#[derive(Debug, Clone)]
pub struct Notes {
    pool: SqlitePool,
}
impl From<&Database> for Notes {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Notes {
    pub async fn get(&self, toc_url: impl AsRef<str>) -> Result<Option<Note>> {
        let row: Option<(String, String)> = sqlx::query_as(include_str!("../../queries/get_note.sql"))
            .bind(toc_url.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(toc_url, text)| Note { toc_url, text }))
    }

    pub async fn get_all(&self) -> Result<Vec<Note>> {
        let rows: Vec<(String, String)> = sqlx::query_as(include_str!("../../queries/list_notes.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|(toc_url, text)| Note { toc_url, text }).collect())
    }

    /// Write a note, replacing any note already stored for its `toc_url`.
    pub async fn put(&self, note: &Note) -> Result<()> {
        sqlx::query(include_str!("../../queries/upsert_note.sql"))
            .bind(&note.toc_url)
            .bind(&note.text)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn delete(&self, toc_url: impl AsRef<str>) -> Result<()> {
        sqlx::query(include_str!("../../queries/delete_note.sql"))
            .bind(toc_url.as_ref())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Delete several notes in one transaction. An empty list is a no-op.
    pub async fn bulk_delete(&self, toc_urls: &[String]) -> Result<()> {
        if toc_urls.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for toc_url in toc_urls {
            sqlx::query(include_str!("../../queries/delete_note.sql"))
                .bind(toc_url)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(notes = toc_urls.len(), "Deleted notes");
        Ok(())
    }
}
