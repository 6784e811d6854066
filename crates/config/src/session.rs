use crate::error::{ErrorKind, Result};
use crate::file::write_atomically;
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Where the sign-in session is saved between runs: one JSON file, readable
/// by its owner only.
///
/// The session type belongs to the remote client; this only stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved session, or `None` without a file.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let data = match std::fs::read(&self.path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            read => read.or_raise(|| ErrorKind::Load)?,
        };
        serde_json::from_slice(&data).map(Some).or_raise(|| ErrorKind::Load)
    }

    pub fn save<T: Serialize>(&self, session: &T) -> Result<()> {
        let data = serde_json::to_vec(session).or_raise(|| ErrorKind::Save(self.path.clone()))?;
        write_atomically(&self.path, &data, true)?;
        tracing::debug!(path = %self.path.display(), "Saved session");
        Ok(())
    }

    /// Forget the saved session. Clearing without a file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            removed => removed.or_raise(|| ErrorKind::Save(self.path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn file() -> (tempfile::TempDir, SessionFile) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(temp_dir.path().join("config/session.json"));
        (temp_dir, file)
    }

    #[test]
    fn test_save_load_clear() {
        let (_temp_dir, file) = file();
        assert_eq!(file.load::<Value>().unwrap(), None);

        let session = json!({ "access_token": "jwt", "refresh_token": "refresh", "user": { "id": "b7c1" } });
        file.save(&session).unwrap();
        assert_eq!(file.load::<Value>().unwrap(), Some(session));

        file.clear().unwrap();
        assert_eq!(file.load::<Value>().unwrap(), None);
        file.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_fails_to_load() {
        let (_temp_dir, file) = file();
        std::fs::create_dir_all(file.path().parent().unwrap()).unwrap();
        std::fs::write(file.path(), "{ truncated").unwrap();
        assert!(matches!(&*file.load::<Value>().unwrap_err(), ErrorKind::Load));
    }
}
