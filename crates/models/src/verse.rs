use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A content or table-of-contents row: an arbitrary JSON object, keyed by its
/// `verse_url` field.
pub type Row = Map<String, Value>;

const VERSE_URL: &str = "verse_url";

/// Selects rows by `verse_url`.
///
/// A collection query matches every row *below* `url` (the `verse_url` starts
/// with `url` followed by a `/`); a single query matches `url` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseQuery {
    pub url: String,
    pub collection: bool,
}

impl VerseQuery {
    pub fn new(url: impl Into<String>, collection: bool) -> Self {
        Self { url: url.into(), collection }
    }

    pub fn single(url: impl Into<String>) -> Self {
        Self::new(url, false)
    }

    pub fn collection(url: impl Into<String>) -> Self {
        Self::new(url, true)
    }

    /// The row field the query filters on.
    #[must_use]
    pub fn column(&self) -> &'static str {
        VERSE_URL
    }

    /// Whether a `verse_url` value is selected by this query.
    #[must_use]
    pub fn matches_url(&self, verse_url: &str) -> bool {
        if self.collection {
            verse_url.strip_prefix(self.url.as_str()).is_some_and(|rest| rest.starts_with('/'))
        } else {
            verse_url == self.url
        }
    }

    /// Rows without a string `verse_url` never match.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        row.get(VERSE_URL).and_then(Value::as_str).is_some_and(|url| self.matches_url(url))
    }

    /// Keep only the matching rows, preserving order.
    #[must_use]
    pub fn filter(&self, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }

    /// SQL parameter for a `verse_url = ?` or `verse_url LIKE ?` clause.
    ///
    /// `LIKE` wildcards inside `url` are not escaped; results of a `LIKE`
    /// push-down must still be passed through [`filter`](Self::filter).
    #[must_use]
    pub fn sql_parameter(&self) -> String {
        match self.collection {
            true => format!("{}/%", self.url),
            false => self.url.clone(),
        }
    }

    /// PostgREST filter expression for the `verse_url` column.
    #[must_use]
    pub fn postgrest_filter(&self) -> String {
        match self.collection {
            // PostgREST accepts `*` as an alias of `%` inside URLs.
            true => format!("like.{}/*", self.url),
            false => format!("eq.{}", self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn row(verse_url: &str) -> Row {
        match json!({ "verse_url": verse_url, "text": "..." }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[rstest]
    #[case("bg/2", true, "bg/2/13", true)]
    #[case("bg/2", true, "bg/2/13/purport", true)]
    #[case("bg/2", true, "bg/2", false)]
    #[case("bg/2", true, "bg/20/1", false)]
    #[case("bg/2", true, "sb/bg/2/1", false)]
    #[case("bg/2/13", false, "bg/2/13", true)]
    #[case("bg/2/13", false, "bg/2/13/1", false)]
    #[case("bg/2/13", false, "bg/2/1", false)]
    fn test_matches_url(#[case] url: &str, #[case] collection: bool, #[case] verse: &str, #[case] expected: bool) {
        assert_eq!(VerseQuery::new(url, collection).matches_url(verse), expected);
    }

    #[test]
    fn test_filter_preserves_order() {
        let rows = vec![row("bg/1/2"), row("bg/2/1"), row("bg/1/1"), row("bg/1")];
        let filtered = VerseQuery::collection("bg/1").filter(rows);
        let urls: Vec<_> = filtered.iter().map(|r| r["verse_url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["bg/1/2", "bg/1/1"]);
    }

    #[test]
    fn test_rows_without_verse_url_never_match() {
        let mut no_url = row("bg/1/1");
        no_url.remove("verse_url");
        let mut numeric = row("bg/1/1");
        numeric.insert("verse_url".to_string(), json!(7));
        assert!(!VerseQuery::single("bg/1/1").matches(&no_url));
        assert!(!VerseQuery::single("7").matches(&numeric));
    }

    #[rstest]
    #[case(VerseQuery::collection("bg/2"), "bg/2/%", "like.bg/2/*")]
    #[case(VerseQuery::single("bg/2/13"), "bg/2/13", "eq.bg/2/13")]
    fn test_push_down_expressions(#[case] query: VerseQuery, #[case] sql: &str, #[case] rest: &str) {
        assert_eq!(query.sql_parameter(), sql);
        assert_eq!(query.postgrest_filter(), rest);
    }
}
