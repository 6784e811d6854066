//! Explicit degradation of failures to empty values.
//!
//! Most reads in the reader treat "couldn't load it" the same as "there is
//! nothing": an unreadable table of contents shows as an empty book rather
//! than an error page. Call sites opt into that with
//! [`or_empty`](Degrade::or_empty), which logs what was lost.

use serde_json::Value;
use std::error::Error as StdError;

/// A value that stands in for data that couldn't be loaded.
pub trait Empty {
    fn empty() -> Self;
}

impl<T> Empty for Vec<T> {
    fn empty() -> Self {
        Vec::new()
    }
}

/// An empty JSON array, the shape of every table of contents.
impl Empty for Value {
    fn empty() -> Self {
        Value::Array(Vec::new())
    }
}

pub trait Degrade<T> {
    /// The value, or [`Empty::empty`] after logging the error at `warn`.
    fn or_empty(self, what: &str) -> T;
}

impl<T, E> Degrade<T> for Result<T, exn::Exn<E>>
where
    T: Empty,
    E: StdError + Send + Sync + 'static,
{
    fn or_empty(self, what: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = ?err, "{what} unavailable; using empty value");
                T::empty()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_or_empty() {
        let ok: Result<Vec<u8>, exn::Exn<ErrorKind>> = Ok(vec![1]);
        assert_eq!(ok.or_empty("bytes"), vec![1]);

        let failed: Result<Value, exn::Exn<ErrorKind>> = Err(exn::Exn::from(ErrorKind::Archive));
        assert_eq!(failed.or_empty("toc"), json!([]));
    }
}
