use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Columns the remote backend adds to every highlight row. They aren't part
/// of the selection.
pub const REMOTE_BOOKKEEPING: &[&str] = &["user_id", "created_at", "updated_at"];

/// A user-selected range inside a table-of-contents entry.
///
/// The local store assigns `id` on insert; the remote backend assigns its own.
/// The two identities are unrelated, so local and remote copies are matched
/// by value (see [`same_selection`](Self::same_selection)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub toc_url: String,
    /// Range and styling fields, stored as given.
    #[serde(flatten)]
    pub range: Map<String, Value>,
}

impl Highlight {
    pub fn new(toc_url: impl Into<String>, range: Map<String, Value>) -> Self {
        Self { id: None, toc_url: toc_url.into(), range }
    }

    /// Copy without an identity, as sent to a store that assigns its own.
    #[must_use]
    pub fn without_id(&self) -> Self {
        Self { id: None, ..self.clone() }
    }

    /// Copy without an identity or the remote bookkeeping columns, as kept
    /// locally for a highlight pulled from the backend.
    #[must_use]
    pub fn selection(&self) -> Self {
        let range = self.selection_fields().map(|(key, value)| (key.clone(), value.clone())).collect();
        Self { id: None, toc_url: self.toc_url.clone(), range }
    }

    fn selection_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.range.iter().filter(|(key, _)| !REMOTE_BOOKKEEPING.contains(&key.as_str()))
    }

    /// Value match: same `toc_url` and the same range fields with the same
    /// values on both sides, ids and [`REMOTE_BOOKKEEPING`] columns aside.
    ///
    /// An empty selection matches nothing.
    #[must_use]
    pub fn same_selection(&self, other: &Highlight) -> bool {
        let mine = self.selection_fields().count();
        mine > 0
            && self.toc_url == other.toc_url
            && mine == other.selection_fields().count()
            && self.selection_fields().all(|(key, value)| other.range.get(key) == Some(value))
    }
}

/// One note per `toc_url`; writes replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub toc_url: String,
    pub text: String,
}

impl Note {
    pub fn new(toc_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self { toc_url: toc_url.into(), text: text.into() }
    }
}

/// One bookmark per `url`; writes replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Bookmark {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), fields: Map::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn range(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_same_selection_ignores_ids() {
        let mut local = Highlight::new("bg/2/13", range(json!({ "start": 4, "end": 19, "color": "yellow" })));
        local.id = Some(7);
        let mut remote = local.without_id();
        remote.id = Some(1042);
        assert!(local.same_selection(&remote));
    }

    #[test]
    fn test_same_selection_ignores_remote_bookkeeping() {
        let local = Highlight::new("bg/2/13", range(json!({ "start": 4, "end": 19 })));
        let remote = Highlight::new("bg/2/13", range(json!({ "start": 4, "end": 19, "user_id": "abc" })));
        assert!(local.same_selection(&remote));
    }

    #[test]
    fn test_same_selection_requires_equal_ranges() {
        let local = Highlight::new("bg/2/13", range(json!({ "start": 4, "end": 19 })));
        let moved = Highlight::new("bg/2/13", range(json!({ "start": 5, "end": 19 })));
        let elsewhere = Highlight::new("bg/2/14", range(json!({ "start": 4, "end": 19 })));
        assert!(!local.same_selection(&moved));
        assert!(!local.same_selection(&elsewhere));
    }

    #[test]
    fn test_same_selection_is_symmetric() {
        let narrow = Highlight::new("bg/2/13", range(json!({ "start": 4 })));
        let wide = Highlight::new("bg/2/13", range(json!({ "start": 4, "end": 19 })));
        assert!(!narrow.same_selection(&wide));
        assert!(!wide.same_selection(&narrow));
    }

    #[test]
    fn test_empty_selection_matches_nothing() {
        let empty = Highlight::new("bg/2/13", Map::new());
        assert!(!empty.same_selection(&empty.clone()));
        let remote = Highlight::new("bg/2/13", range(json!({ "start": 0, "end": 9 })));
        assert!(!empty.same_selection(&remote));
    }

    #[test]
    fn test_selection_drops_bookkeeping() {
        let mut remote = Highlight::new("bg/2/13", range(json!({ "start": 4, "user_id": "abc", "created_at": "now" })));
        remote.id = Some(1042);
        let local = remote.selection();
        assert_eq!(local.id, None);
        assert_eq!(local.range, range(json!({ "start": 4 })));
        assert!(local.same_selection(&remote));
    }

    #[test]
    fn test_highlight_flattens_range_fields() {
        let h: Highlight = serde_json::from_value(json!({ "id": 3, "toc_url": "bg/1/1", "start": 0 })).unwrap();
        assert_eq!(h.id, Some(3));
        assert_eq!(h.range.get("start"), Some(&json!(0)));
        let out = serde_json::to_value(h.without_id()).unwrap();
        assert!(out.get("id").is_none());
    }
}
