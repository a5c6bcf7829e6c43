//! On-disk layout.
//!
//! ```text
//! ~/.fieldcal/
//!   collections/<collection>/<id>.json   documents (mode 0600)
//!   blobs/<path>                          rendered reports
//!   templates/                            renderer overrides (*.tera)
//!   logs/
//! ```
//!
//! Every function has an `_at(home)` form; the no-arg forms resolve `home`
//! with `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};

pub fn root_at(home: &Path) -> PathBuf {
    home.join(".fieldcal")
}

pub fn collections_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("collections")
}

pub fn blobs_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("blobs")
}

pub fn templates_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("templates")
}

pub fn logs_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("logs")
}

pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

pub fn root() -> Result<PathBuf, StoreError> {
    Ok(root_at(&home()?))
}

/// Reject anything that is not a plain relative path (`..`, absolute paths,
/// empty segments).
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Create `dir` (and parents) with mode `0700`.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }
    Ok(())
}

/// Write `bytes` to `<path>.tmp`, then rename over `path`. The file ends up
/// with mode `0600`.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
