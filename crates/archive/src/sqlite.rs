//! Embedded SQLite books.
//!
//! A book database holds one table per book code with a `verse_url` column
//! plus whatever content columns the publisher chose. Rows come back as JSON
//! objects keyed by column name, so they look the same as rows read from a
//! JSON archive.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sastra_models::{Row, VerseQuery};
use serde_json::{Number, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _, TypeInfo, ValueRef};
use std::path::Path;

/// Quote an SQL identifier, doubling embedded quotes.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn select_sql(table: &str, filter: Option<&VerseQuery>) -> String {
    let table = quote_identifier(table);
    match filter {
        None => format!("SELECT * FROM {table}"),
        Some(query) if query.collection => format!("SELECT * FROM {table} WHERE verse_url LIKE ?1"),
        Some(_) => format!("SELECT * FROM {table} WHERE verse_url = ?1"),
    }
}

/// Read every row of `table` (optionally narrowed by `filter`) from the
/// SQLite file at `path`.
///
/// The file is opened read-only and never created.
pub(crate) async fn read_table(path: &Path, table: &str, filter: Option<&VerseQuery>) -> Result<Vec<Row>> {
    if !tokio::fs::try_exists(path).await.map_err(ErrorKind::Io)? {
        exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
    }
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false)
        .connect()
        .await
        .or_raise(|| ErrorKind::Database)?;
    let sql = select_sql(table, filter);
    let mut query = sqlx::query(&sql);
    if let Some(filter) = filter {
        query = query.bind(filter.sql_parameter());
    }
    let rows = query.fetch_all(&mut conn).await.or_raise(|| ErrorKind::Database);
    // Close regardless of the query outcome; a failed close leaves nothing to clean up.
    _ = conn.close().await;
    let rows = rows?;
    tracing::debug!(path = %path.display(), table, rows = rows.len(), "Read embedded book table");
    let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;
    // LIKE treats `_` and `%` inside the url as wildcards.
    Ok(match filter {
        Some(filter) => filter.filter(rows),
        None => rows,
    })
}

/// Convert a row using each value's runtime storage class, not the declared
/// column type (SQLite columns are loosely typed).
fn row_to_json(row: &SqliteRow) -> Result<Row> {
    let mut map = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index).or_raise(|| ErrorKind::Database)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(index).or_raise(|| ErrorKind::Database)?),
                "REAL" => {
                    let real = row.try_get_unchecked::<f64, _>(index).or_raise(|| ErrorKind::Database)?;
                    Number::from_f64(real).map(Value::Number).unwrap_or(Value::Null)
                },
                "BLOB" => Value::from(row.try_get_unchecked::<Vec<u8>, _>(index).or_raise(|| ErrorKind::Database)?),
                _ => Value::from(row.try_get_unchecked::<String, _>(index).or_raise(|| ErrorKind::Database)?),
            }
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqliteConnection;

    /// Create a book database with a `gita` table at `path`.
    pub(crate) async fn create_book_db(path: &Path) {
        let mut conn: SqliteConnection =
            SqliteConnectOptions::new().filename(path).create_if_missing(true).connect().await.unwrap();
        sqlx::query(
            r#"
                CREATE TABLE gita (verse_url TEXT NOT NULL, text TEXT, chapter INTEGER, weight REAL, extra BLOB);
                INSERT INTO gita VALUES ('bg/1/1', 'dhrtarastra uvaca', 1, 0.5, NULL);
                INSERT INTO gita VALUES ('bg/1/2', 'sanjaya uvaca', 1, NULL, NULL);
                INSERT INTO gita VALUES ('bg/10/1', 'sri-bhagavan uvaca', 10, NULL, NULL);
                INSERT INTO gita VALUES ('bgx1/1', 'not a gita verse', 1, NULL, NULL);
            "#,
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("gita"), "\"gita\"");
        assert_eq!(quote_identifier("gi\"ta"), "\"gi\"\"ta\"");
    }

    #[tokio::test]
    async fn test_read_whole_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gita.db");
        create_book_db(&path).await;
        let rows = read_table(&path, "gita", None).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["verse_url"], json!("bg/1/1"));
        assert_eq!(rows[0]["chapter"], json!(1));
        assert_eq!(rows[0]["weight"], json!(0.5));
        assert_eq!(rows[0]["extra"], Value::Null);
    }

    #[tokio::test]
    async fn test_read_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gita.db");
        create_book_db(&path).await;
        let rows = read_table(&path, "gita", Some(&VerseQuery::collection("bg/1"))).await.unwrap();
        let urls: Vec<_> = rows.iter().map(|r| r["verse_url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["bg/1/1", "bg/1/2"]);
    }

    #[tokio::test]
    async fn test_like_wildcards_in_url_are_filtered_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gita.db");
        create_book_db(&path).await;
        // `bg_1/%` matches `bgx1/1` in SQL, but not as a prefix.
        let rows = read_table(&path, "gita", Some(&VerseQuery::collection("bg_1"))).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_read_single_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gita.db");
        create_book_db(&path).await;
        let rows = read_table(&path, "gita", Some(&VerseQuery::single("bg/10/1"))).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["text"], json!("sri-bhagavan uvaca"));
    }

    #[tokio::test]
    async fn test_missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let err = read_table(&path, "gita", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_table_is_a_database_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gita.db");
        create_book_db(&path).await;
        let err = read_table(&path, "sb", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));
    }
}
