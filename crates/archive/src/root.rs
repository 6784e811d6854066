//! Directory roots that books are read from.
//!
//! The application knows two: the user's document folder (downloaded books
//! under `SastraApp/`) and the bundled resource folder (`resources/`). Both are
//! plain directories accessed through `tokio::fs`; every relative path is
//! validated first so it can't climb out of its root.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Validates a path relative to a [`FileRoot`].
///
/// Resolves `.` and `..` components and rejects anything that would leave the
/// root, null bytes, platform prefixes and paths that resolve to nothing.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use sastra_archive::validate_path;
/// assert!(validate_path("SastraApp/db/gita.db").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert_eq!(
///     validate_path("SastraApp/./db/../bookslist.json").unwrap(),
///     Path::new("SastraApp/bookslist.json")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but
                // truncate paths in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// An absolute directory that relative book paths resolve against.
///
/// # Examples
///
/// ```no_run
/// use sastra_archive::FileRoot;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let documents = FileRoot::new("documents", "/home/reader/Documents")?;
/// let manifest = documents.absolute_path("SastraApp/bookslist.json")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRoot {
    name: String,
    root: PathBuf,
}

impl FileRoot {
    /// The directory doesn't have to exist yet: a fresh install has no
    /// `SastraApp` folder, which simply reads as "no books".
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if `root` is relative
    /// or names an existing non-directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root })
    }

    /// Name used in log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate `path` and join it onto the root.
    pub fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    pub async fn exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    /// Read a whole file.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    pub async fn read_to_string(&self, path: impl AsRef<Path>) -> Result<String> {
        let data = self.read(path).await?;
        String::from_utf8(data).or_raise(|| ErrorKind::InvalidData)
    }

    /// Write a whole file, creating parent directories as needed.
    pub async fn write(&self, path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }
}
