use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;

/// Replace `path` with `data` through a sibling staging file, creating parent
/// directories as needed. With `private`, the file is readable by its owner
/// only (on Unix).
pub(crate) fn write_atomically(path: &Path, data: &[u8], private: bool) -> Result<()> {
    let failed = || ErrorKind::Save(path.to_path_buf());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).or_raise(failed)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    std::fs::write(&staging, data).or_raise(failed)?;
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o600)).or_raise(failed)?;
    }
    #[cfg(not(unix))]
    let _ = private;
    std::fs::rename(&staging, path).or_raise(failed)?;
    Ok(())
}
