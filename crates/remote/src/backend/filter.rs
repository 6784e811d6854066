use sastra_models::{Row, VerseQuery};
use serde_json::Value;

/// A row condition understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, Value),
    /// `column IN (values)`
    In(String, Vec<String>),
    /// `verse_url` equality or prefix match.
    Verse(VerseQuery),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn is_in(column: impl Into<String>, values: &[String]) -> Self {
        Self::In(column.into(), values.to_vec())
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Eq(column, _) | Self::In(column, _) => column,
            Self::Verse(query) => query.column(),
        }
    }

    /// Query-string expression in PostgREST syntax, e.g. `eq.bg/1/1` or
    /// `in.("a","b")`.
    pub fn to_postgrest(&self) -> String {
        match self {
            Self::Eq(_, value) => format!("eq.{}", plain(value)),
            Self::In(_, values) => {
                let quoted: Vec<String> =
                    values.iter().map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""))).collect();
                format!("in.({})", quoted.join(","))
            },
            Self::Verse(query) => query.postgrest_filter(),
        }
    }

    /// Exact evaluation against a row.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Eq(column, value) => row.get(column).is_some_and(|found| plain(found) == plain(value)),
            Self::In(column, values) => row.get(column).is_some_and(|found| values.contains(&plain(found))),
            Self::Verse(query) => query.matches(row),
        }
    }
}

/// Strings without their JSON quotes; everything else as JSON text.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
