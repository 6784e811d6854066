use crate::ArchiveFormat;
use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

impl Display for ArchiveFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ArchiveFormat::Json),
            "zip" => Ok(ArchiveFormat::Zip),
            "gz" | "gzip" => Ok(ArchiveFormat::Gzip),
            "bz2" | "bzip2" => Ok(ArchiveFormat::Bzip2),
            "db" | "sqlite" | "sqlite3" => Ok(ArchiveFormat::Sqlite),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ArchiveFormat {
    /// Detect the format from a file extension.
    ///
    /// Only the last extension counts: `toc_gita.json.zip` is a zip archive.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or(ArchiveFormat::Unsupported)
    }

    /// Short name for display and logging.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Json => "json",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Gzip => "gzip",
            ArchiveFormat::Bzip2 => "bzip2",
            ArchiveFormat::Sqlite => "sqlite",
            ArchiveFormat::Unsupported => "unsupported",
        }
    }

    /// Whether the file decodes to a single JSON document (as opposed to a
    /// queryable database).
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, ArchiveFormat::Json | ArchiveFormat::Zip | ArchiveFormat::Gzip | ArchiveFormat::Bzip2)
    }
}
