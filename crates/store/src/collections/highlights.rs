use super::{from_json, to_json};
use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use sastra_models::Highlight;
use serde_json::Value;
use sqlx::SqlitePool;

/// User highlights. The store assigns the integer `id` on insert.
#[derive(Debug, Clone)]
pub struct Highlights {
    pool: SqlitePool,
}
impl From<&Database> for Highlights {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

type HighlightRow = (i64, String, String);

fn into_highlight((id, toc_url, data): HighlightRow) -> Result<Highlight> {
    Ok(Highlight { id: Some(id), toc_url, range: from_json(&data, "highlight")? })
}

impl Highlights {
    /// Insert a new highlight and return the id the store assigned to it.
    ///
    /// Any `id` already on the highlight is ignored.
    pub async fn add(&self, highlight: &Highlight) -> Result<i64> {
        let id = sqlx::query(include_str!("../../queries/insert_highlight.sql"))
            .bind(&highlight.toc_url)
            .bind(to_json(&highlight.range, "highlight")?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?
            .last_insert_rowid();
        tracing::debug!(id, toc_url = %highlight.toc_url, "Stored highlight");
        Ok(id)
    }

    /// Replace the highlight with the same `id`, inserting it if absent.
    pub async fn put(&self, highlight: &Highlight) -> Result<()> {
        let id = highlight.id.ok_or_raise(|| ErrorKind::MissingKey("id"))?;
        sqlx::query(include_str!("../../queries/upsert_highlight.sql"))
            .bind(id)
            .bind(&highlight.toc_url)
            .bind(to_json(&highlight.range, "highlight")?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Highlight>> {
        let row: Option<HighlightRow> = sqlx::query_as(include_str!("../../queries/get_highlight.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(into_highlight).transpose()
    }

    pub async fn get_all(&self) -> Result<Vec<Highlight>> {
        let rows: Vec<HighlightRow> = sqlx::query_as(include_str!("../../queries/list_highlights.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(into_highlight).collect()
    }

    /// Every highlight whose `field` equals `value`.
    ///
    /// `field` may name `id`, `toc_url`, or any range field. The scan happens
    /// in memory; the collection is small and its range fields are free-form.
    pub async fn where_eq(&self, field: &str, value: &Value) -> Result<Vec<Highlight>> {
        let all = self.get_all().await?;
        Ok(all
            .into_iter()
            .filter(|highlight| match field {
                "id" => highlight.id.map(Value::from).as_ref() == Some(value),
                "toc_url" => value.as_str() == Some(highlight.toc_url.as_str()),
                other => highlight.range.get(other) == Some(value),
            })
            .collect())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query(include_str!("../../queries/delete_highlight.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Map, json};

    fn highlight(toc_url: &str, range: Value) -> Highlight {
        match range {
            Value::Object(map) => Highlight::new(toc_url, map),
            _ => Highlight::new(toc_url, Map::new()),
        }
    }

    #[tokio::test]
    async fn test_add_assigns_increasing_ids() {
        let db = Database::connect_in_memory().await.unwrap();
        let highlights = db.highlights();
        let first = highlights.add(&highlight("bg/1/1", json!({ "start": 0 }))).await.unwrap();
        let second = highlights.add(&highlight("bg/1/1", json!({ "start": 5 }))).await.unwrap();
        assert!(second > first);

        let stored = highlights.get(second).await.unwrap().unwrap();
        assert_eq!(stored.id, Some(second));
        assert_eq!(stored.toc_url, "bg/1/1");
        assert_eq!(stored.range.get("start"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_put_requires_id() {
        let db = Database::connect_in_memory().await.unwrap();
        let err = db.highlights().put(&highlight("bg/1/1", json!({}))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingKey("id")));
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let db = Database::connect_in_memory().await.unwrap();
        let highlights = db.highlights();
        let id = highlights.add(&highlight("bg/1/1", json!({ "color": "yellow" }))).await.unwrap();
        let mut changed = highlights.get(id).await.unwrap().unwrap();
        changed.range.insert("color".into(), json!("blue"));
        highlights.put(&changed).await.unwrap();

        let all = highlights.get_all().await.unwrap();
        assert_eq!(all, vec![changed]);
    }

    #[rstest]
    #[case("toc_url", json!("bg/2/13"), 2)]
    #[case("color", json!("yellow"), 2)]
    #[case("color", json!("blue"), 1)]
    #[case("start", json!(4), 1)]
    #[case("missing", json!(4), 0)]
    #[tokio::test]
    async fn test_where_eq(#[case] field: &str, #[case] value: Value, #[case] expected: usize) {
        let db = Database::connect_in_memory().await.unwrap();
        let highlights = db.highlights();
        highlights.add(&highlight("bg/2/13", json!({ "start": 4, "color": "yellow" }))).await.unwrap();
        highlights.add(&highlight("bg/2/13", json!({ "start": 9, "color": "blue" }))).await.unwrap();
        highlights.add(&highlight("bg/2/14", json!({ "start": 1, "color": "yellow" }))).await.unwrap();
        assert_eq!(highlights.where_eq(field, &value).await.unwrap().len(), expected);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::connect_in_memory().await.unwrap();
        let highlights = db.highlights();
        let id = highlights.add(&highlight("bg/1/1", json!({}))).await.unwrap();
        highlights.delete(id).await.unwrap();
        assert!(highlights.get(id).await.unwrap().is_none());
        assert!(highlights.where_eq("id", &json!(id)).await.unwrap().is_empty());
    }
}
