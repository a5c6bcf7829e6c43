//! Document repository: named collections of JSON documents keyed by a
//! string `id` field.
//!
//! [`FsRepository`] keeps one file per document under
//! `~/.fieldcal/collections/<collection>/<id>.json`. [`MemoryRepository`]
//! backs tests and throwaway sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{io_err, StoreError};
use crate::paths::{self, atomic_write, check_key, ensure_dir};

pub const DRAFTS: &str = "drafts";
pub const SETTINGS: &str = "settings";
pub const SITES: &str = "sites";
pub const CUSTOMERS: &str = "customers";

/// Generic document store.
///
/// `save` assigns a fresh id when the record has none (or an empty one) and
/// returns the stored record.
pub trait DocumentRepository: Send + Sync {
    fn get_all(&self, collection: &str) -> Result<Vec<Value>, StoreError>;
    fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;
    fn save(&self, collection: &str, record: Value) -> Result<Value, StoreError>;
    /// Deleting a missing document is not an error.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Id of `record`, if it carries a non-empty string one.
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Give `record` an id if it lacks one and return it.
fn assign_id(record: &mut Value) -> Result<String, StoreError> {
    if let Some(id) = record_id(record) {
        let id = id.to_string();
        check_key(&id)?;
        return Ok(id);
    }
    let Value::Object(map) = record else {
        return Err(StoreError::InvalidKey("document is not an object".into()));
    };
    let id = new_document_id();
    map.insert("id".into(), Value::String(id.clone()));
    Ok(id)
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

fn decode<T: DeserializeOwned>(collection: &str, value: Value) -> Result<T, StoreError> {
    let id = record_id(&value).unwrap_or_default().to_string();
    serde_json::from_value(value).map_err(|source| StoreError::Malformed {
        collection: collection.to_string(),
        id,
        source,
    })
}

pub fn get_typed<T: DeserializeOwned>(
    repo: &dyn DocumentRepository,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    repo.get_by_id(collection, id)?
        .map(|v| decode(collection, v))
        .transpose()
}

/// All documents of a collection. Documents that fail to decode are skipped
/// with a warning.
pub fn list_typed<T: DeserializeOwned>(
    repo: &dyn DocumentRepository,
    collection: &str,
) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for value in repo.get_all(collection)? {
        match decode(collection, value) {
            Ok(doc) => out.push(doc),
            Err(e) => tracing::warn!("skipping document: {e}"),
        }
    }
    Ok(out)
}

pub fn save_typed<T: Serialize + DeserializeOwned>(
    repo: &dyn DocumentRepository,
    collection: &str,
    doc: &T,
) -> Result<T, StoreError> {
    let stored = repo.save(collection, serde_json::to_value(doc)?)?;
    decode(collection, stored)
}

// ---------------------------------------------------------------------------
// FsRepository
// ---------------------------------------------------------------------------

pub struct FsRepository {
    root: PathBuf,
}

impl FsRepository {
    /// Repository rooted at `<home>/.fieldcal/collections`.
    pub fn open_at(home: &Path) -> Self {
        Self::with_root(paths::collections_dir_at(home))
    }

    pub fn open() -> Result<Self, StoreError> {
        Ok(Self::open_at(&paths::home()?))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, StoreError> {
        check_key(collection)?;
        Ok(self.root.join(collection))
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        check_key(id)?;
        if id.contains('/') {
            return Err(StoreError::InvalidKey(id.to_string()));
        }
        Ok(self.collection_dir(collection)?.join(format!("{id}.json")))
    }

    fn read(path: &Path) -> Result<Value, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl DocumentRepository for FsRepository {
    fn get_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let dir = self.collection_dir(collection)?;
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let path = entry.map_err(|e| io_err(&dir, e))?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read(&path) {
                Ok(v) => out.push(v),
                Err(e) => tracing::warn!("unreadable document {}: {e}", path.display()),
            }
        }
        Ok(out)
    }

    fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let path = self.document_path(collection, id)?;
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn save(&self, collection: &str, mut record: Value) -> Result<Value, StoreError> {
        let id = assign_id(&mut record)?;
        let path = self.document_path(collection, &id)?;
        ensure_dir(&self.root)?;
        let json = serde_json::to_string_pretty(&record)?;
        atomic_write(&path, json.as_bytes())?;
        tracing::debug!("saved {collection}/{id}");
        Ok(record)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let path = self.document_path(collection, id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("deleted {collection}/{id}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRepository {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, Value>>> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.collections.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl DocumentRepository for MemoryRepository {
    fn get_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .lock()
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    fn save(&self, collection: &str, mut record: Value) -> Result<Value, StoreError> {
        check_key(collection)?;
        let id = assign_id(&mut record)?;
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.lock().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn exercise(repo: &dyn DocumentRepository) {
        let saved = repo.save(DRAFTS, json!({"step": 1})).unwrap();
        let id = record_id(&saved).unwrap().to_string();
        assert_eq!(id.len(), 32);

        let again = repo
            .save(DRAFTS, json!({"id": id, "step": 2}))
            .unwrap();
        assert_eq!(record_id(&again), Some(id.as_str()));
        assert_eq!(repo.get_all(DRAFTS).unwrap().len(), 1);
        assert_eq!(repo.get_by_id(DRAFTS, &id).unwrap().unwrap()["step"], 2);

        repo.delete(DRAFTS, &id).unwrap();
        repo.delete(DRAFTS, &id).unwrap();
        assert!(repo.get_by_id(DRAFTS, &id).unwrap().is_none());
        assert!(repo.get_all("empty").unwrap().is_empty());
    }

    #[test]
    fn memory_repository_contract() {
        exercise(&MemoryRepository::new());
    }

    #[test]
    fn fs_repository_contract() {
        let home = TempDir::new().unwrap();
        exercise(&FsRepository::open_at(home.path()));
    }

    #[test]
    fn fs_repository_rejects_traversal() {
        let home = TempDir::new().unwrap();
        let repo = FsRepository::open_at(home.path());
        let err = repo.save(DRAFTS, json!({"id": "../../x"})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(repo.get_by_id("../drafts", "a").is_err());
    }

    #[test]
    fn fs_repository_skips_unreadable_files() {
        let home = TempDir::new().unwrap();
        let repo = FsRepository::open_at(home.path());
        repo.save(SITES, json!({"id": "s1"})).unwrap();
        let dir = paths::collections_dir_at(home.path()).join(SITES);
        std::fs::write(dir.join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        assert_eq!(repo.get_all(SITES).unwrap().len(), 1);
    }

    #[test]
    fn non_object_records_are_rejected() {
        let repo = MemoryRepository::new();
        assert!(repo.save(DRAFTS, json!([1, 2])).is_err());
    }

    #[test]
    fn typed_helpers_report_malformed_documents() {
        #[derive(serde::Deserialize, Debug)]
        struct Strict {
            #[allow(dead_code)]
            step: u32,
        }
        let repo = MemoryRepository::new();
        repo.save(DRAFTS, json!({"id": "d1", "step": "nope"})).unwrap();
        repo.save(DRAFTS, json!({"id": "d2", "step": 3})).unwrap();
        let err = get_typed::<Strict>(&repo, DRAFTS, "d1").unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref id, .. } if id == "d1"));
        assert_eq!(list_typed::<Strict>(&repo, DRAFTS).unwrap().len(), 1);
    }
}
