use super::{from_json, to_json};
use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sastra_models::Row;
use serde_json::Value;
use sqlx::SqlitePool;

/// Cached content rows, keyed by their `id` field.
#[derive(Debug, Clone)]
pub struct Content {
    pool: SqlitePool,
}
impl From<&Database> for Content {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

/// String and integer ids are both accepted; `7` and `"7"` name the same record.
fn key_of(row: &Row) -> Result<String> {
    match row.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => exn::bail!(ErrorKind::MissingKey("id")),
    }
}

impl Content {
    pub async fn get(&self, id: impl AsRef<str>) -> Result<Option<Row>> {
        let row: Option<(String, String)> = sqlx::query_as(include_str!("../../queries/get_content.sql"))
            .bind(id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(|(_, data)| from_json(&data, "content")).transpose()
    }

    pub async fn get_all(&self) -> Result<Vec<Row>> {
        let rows: Vec<(String, String)> = sqlx::query_as(include_str!("../../queries/list_content.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.iter().map(|(_, data)| from_json(data, "content")).collect()
    }

    /// Insert or replace a record.
    pub async fn put(&self, row: &Row) -> Result<()> {
        sqlx::query(include_str!("../../queries/upsert_content.sql"))
            .bind(key_of(row)?)
            .bind(to_json(row, "content")?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Insert or replace many records in one transaction: either all of them
    /// are written or none is.
    pub async fn bulk_put(&self, rows: &[Row]) -> Result<()> {
        // Validate everything before touching the database.
        let records =
            rows.iter().map(|row| Ok((key_of(row)?, to_json(row, "content")?))).collect::<Result<Vec<_>>>()?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for (id, data) in records {
            sqlx::query(include_str!("../../queries/upsert_content.sql"))
                .bind(id)
                .bind(data)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(records = rows.len(), "Cached content rows");
        Ok(())
    }

    pub async fn delete(&self, id: impl AsRef<str>) -> Result<()> {
        sqlx::query(include_str!("../../queries/delete_content.sql"))
            .bind(id.as_ref())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
