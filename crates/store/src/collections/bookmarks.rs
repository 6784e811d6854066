use super::{from_json, to_json};
use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sastra_models::Bookmark;
use sqlx::SqlitePool;

/// Bookmarks, one per `url`.
#[derive(Debug, Clone)]
pub struct Bookmarks {
    pool: SqlitePool,
}
impl From<&Database> for Bookmarks {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

fn into_bookmark((url, data): (String, String)) -> Result<Bookmark> {
    Ok(Bookmark { url, fields: from_json(&data, "bookmark")? })
}

impl Bookmarks {
    pub async fn get(&self, url: impl AsRef<str>) -> Result<Option<Bookmark>> {
        let row: Option<(String, String)> = sqlx::query_as(include_str!("../../queries/get_bookmark.sql"))
            .bind(url.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(into_bookmark).transpose()
    }

    pub async fn get_all(&self) -> Result<Vec<Bookmark>> {
        let rows: Vec<(String, String)> = sqlx::query_as(include_str!("../../queries/list_bookmarks.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(into_bookmark).collect()
    }

    pub async fn put(&self, bookmark: &Bookmark) -> Result<()> {
        sqlx::query(include_str!("../../queries/upsert_bookmark.sql"))
            .bind(&bookmark.url)
            .bind(to_json(&bookmark.fields, "bookmark")?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn delete(&self, url: impl AsRef<str>) -> Result<()> {
        sqlx::query(include_str!("../../queries/delete_bookmark.sql"))
            .bind(url.as_ref())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_delete() {
        let db = Database::connect_in_memory().await.unwrap();
        let bookmarks = db.bookmarks();
        let mut bookmark = Bookmark::new("bg/2/47");
        bookmark.fields.insert("title".into(), json!("Karma yoga"));
        bookmarks.put(&bookmark).await.unwrap();
        assert_eq!(bookmarks.get("bg/2/47").await.unwrap(), Some(bookmark.clone()));

        bookmark.fields.insert("title".into(), json!("Renamed"));
        bookmarks.put(&bookmark).await.unwrap();
        assert_eq!(bookmarks.get_all().await.unwrap(), vec![bookmark]);

        bookmarks.delete("bg/2/47").await.unwrap();
        assert!(bookmarks.get_all().await.unwrap().is_empty());
    }
}
