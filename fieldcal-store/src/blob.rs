//! Blob store for rendered reports.
//!
//! Paths are relative keys such as `reports/<assetId>/<fileName>`; `put`
//! returns the URL recorded in the archival record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{io_err, StoreError};
use crate::paths::{self, atomic_write, check_key};

pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError>;
    fn get(&self, url: &str) -> Result<Vec<u8>, StoreError>;
    /// Deleting a missing blob is not an error.
    fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// Storage key of a finalized report document.
pub fn report_blob_path(asset_id: &str, file_name: &str) -> String {
    format!("reports/{asset_id}/{file_name}")
}

// ---------------------------------------------------------------------------
// FsBlobStore
// ---------------------------------------------------------------------------

const FILE_SCHEME: &str = "file://";

/// Blobs as files under `~/.fieldcal/blobs`. URLs are `file://` URLs.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn open_at(home: &Path) -> Self {
        Self::with_root(paths::blobs_dir_at(home))
    }

    pub fn open() -> Result<Self, StoreError> {
        Ok(Self::open_at(&paths::home()?))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        check_key(path)?;
        Ok(self.root.join(path))
    }

    /// Blob key for a URL this store handed out.
    fn key_for_url(&self, url: &str) -> Result<PathBuf, StoreError> {
        let file = url
            .strip_prefix(FILE_SCHEME)
            .ok_or_else(|| StoreError::BlobNotFound(url.to_string()))?;
        let file = PathBuf::from(file);
        let rel = file
            .strip_prefix(&self.root)
            .map_err(|_| StoreError::BlobNotFound(url.to_string()))?;
        self.resolve(&rel.to_string_lossy().replace('\\', "/"))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let file = self.resolve(path)?;
        atomic_write(&file, bytes)?;
        tracing::info!("stored blob {}", file.display());
        Ok(format!("{FILE_SCHEME}{}", file.display()))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        let file = self.key_for_url(url)?;
        match std::fs::read(&file) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BlobNotFound(url.to_string()))
            }
            Err(e) => Err(io_err(file, e)),
        }
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let file = self.resolve(path)?;
        match std::fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(file, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

const MEMORY_SCHEME: &str = "memory://";

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError> {
        check_key(path)?;
        self.lock().insert(path.to_string(), bytes.to_vec());
        Ok(format!("{MEMORY_SCHEME}{path}"))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        url.strip_prefix(MEMORY_SCHEME)
            .and_then(|path| self.lock().get(path).cloned())
            .ok_or_else(|| StoreError::BlobNotFound(url.to_string()))
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.lock().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn BlobStore) {
        let key = report_blob_path("a1", "2024.05.01-CALR1001-CV12.pdf");
        assert_eq!(key, "reports/a1/2024.05.01-CALR1001-CV12.pdf");
        let url = store.put(&key, b"<html>").unwrap();
        assert_eq!(store.get(&url).unwrap(), b"<html>");
        store.delete(&key).unwrap();
        store.delete(&key).unwrap();
        assert!(matches!(store.get(&url), Err(StoreError::BlobNotFound(_))));
    }

    #[test]
    fn memory_blob_store_contract() {
        exercise(&MemoryBlobStore::new());
    }

    #[test]
    fn fs_blob_store_contract() {
        let home = TempDir::new().unwrap();
        let store = FsBlobStore::open_at(home.path());
        exercise(&store);
    }

    #[test]
    fn fs_blob_store_refuses_foreign_urls() {
        let home = TempDir::new().unwrap();
        let store = FsBlobStore::open_at(home.path());
        assert!(store.get("file:///etc/passwd").is_err());
        assert!(store.get("https://example.test/x.pdf").is_err());
        assert!(store.put("../x", b"").is_err());
    }
}
