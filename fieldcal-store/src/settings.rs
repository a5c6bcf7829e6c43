//! Persistence of the reporting settings bundle (`settings/reporting`).
//!
//! Saves are hash-gated: the SHA-256 of the serialized bundle (without
//! `updatedAt`) is compared with the last one written, and identical content
//! is skipped.

use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

use fieldcal_core::{ReportingSettings, SettingsSeed};
use fieldcal_core::settings::SeedSummary;

use crate::error::StoreError;
use crate::repository::{DocumentRepository, SETTINGS};

/// Document id of the bundle inside the settings collection.
pub const SETTINGS_ID: &str = "reporting";

/// Outcome of [`SettingsStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { hash: String },
    /// Content matched the last write.
    Unchanged,
}

/// SHA-256 hex digest of the bundle content.
pub fn content_hash(settings: &ReportingSettings) -> Result<String, StoreError> {
    let mut value = serde_json::to_value(settings)?;
    if let Value::Object(map) = &mut value {
        map.remove("updatedAt");
    }
    let mut h = Sha256::new();
    h.update(serde_json::to_vec(&value)?);
    Ok(hex::encode(h.finalize()))
}

/// Reads and writes the bundle. One per session.
#[derive(Default)]
pub struct SettingsStore {
    last_hash: Mutex<Option<String>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the bundle. Fields missing from the stored document take the
    /// built-in defaults; a missing document is the defaults.
    pub fn try_load(&self, repo: &dyn DocumentRepository) -> Result<ReportingSettings, StoreError> {
        let Some(mut value) = repo.get_by_id(SETTINGS, SETTINGS_ID)? else {
            return Ok(ReportingSettings::default());
        };
        if let Value::Object(map) = &mut value {
            map.remove("id");
        }
        let settings: ReportingSettings =
            serde_json::from_value(value).map_err(|source| StoreError::Malformed {
                collection: SETTINGS.to_string(),
                id: SETTINGS_ID.to_string(),
                source,
            })?;
        *self.lock() = Some(content_hash(&settings)?);
        Ok(settings)
    }

    /// [`Self::try_load`], falling back to the defaults on any failure.
    pub fn load(&self, repo: &dyn DocumentRepository) -> ReportingSettings {
        match self.try_load(repo) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("settings load failed, using defaults: {e}");
                ReportingSettings::default()
            }
        }
    }

    /// Persist `settings` unless its content matches the last write. Stamps
    /// `updatedAt` on write.
    pub fn save(
        &self,
        repo: &dyn DocumentRepository,
        settings: &ReportingSettings,
    ) -> Result<SaveOutcome, StoreError> {
        let hash = content_hash(settings)?;
        if self.lock().as_deref() == Some(hash.as_str()) {
            tracing::debug!("settings unchanged ({hash})");
            return Ok(SaveOutcome::Unchanged);
        }

        let mut stamped = settings.clone();
        stamped.updated_at = Some(Utc::now());
        let mut value = serde_json::to_value(&stamped)?;
        if let Value::Object(map) = &mut value {
            map.insert("id".into(), Value::String(SETTINGS_ID.into()));
        }
        repo.save(SETTINGS, value)?;
        *self.lock() = Some(hash.clone());
        tracing::info!("settings saved ({hash})");
        Ok(SaveOutcome::Written { hash })
    }

    /// Apply a YAML seed to the stored bundle and save it.
    pub fn import_seed(
        &self,
        repo: &dyn DocumentRepository,
        seed: SettingsSeed,
    ) -> Result<(ReportingSettings, SeedSummary), StoreError> {
        let mut settings = self.try_load(repo)?;
        let summary = settings.apply_seed(seed)?;
        self.save(repo, &settings)?;
        Ok((settings, summary))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_hash.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use serde_json::json;

    #[test]
    fn missing_document_loads_defaults() {
        let repo = MemoryRepository::new();
        let s = SettingsStore::new().try_load(&repo).unwrap();
        assert_eq!(s, ReportingSettings::default());
    }

    #[test]
    fn partial_document_overlays_defaults() {
        let repo = MemoryRepository::new();
        repo.save(SETTINGS, json!({"id": "reporting", "units": ["t/h"]})).unwrap();
        let s = SettingsStore::new().try_load(&repo).unwrap();
        assert_eq!(s.units, vec!["t/h".to_string()]);
        assert_eq!(s.templates.len(), ReportingSettings::default().templates.len());
    }

    #[test]
    fn malformed_document_falls_back_to_defaults() {
        let repo = MemoryRepository::new();
        repo.save(SETTINGS, json!({"id": "reporting", "units": 7})).unwrap();
        let store = SettingsStore::new();
        assert!(matches!(store.try_load(&repo), Err(StoreError::Malformed { .. })));
        assert_eq!(store.load(&repo), ReportingSettings::default());
    }

    #[test]
    fn identical_saves_are_skipped() {
        let repo = MemoryRepository::new();
        let store = SettingsStore::new();
        let mut s = ReportingSettings::default();
        assert!(matches!(store.save(&repo, &s).unwrap(), SaveOutcome::Written { .. }));
        assert_eq!(store.save(&repo, &s).unwrap(), SaveOutcome::Unchanged);

        s.add_unit("kN").unwrap();
        assert!(matches!(store.save(&repo, &s).unwrap(), SaveOutcome::Written { .. }));

        let stored = repo.get_by_id(SETTINGS, SETTINGS_ID).unwrap().unwrap();
        assert!(stored.get("updatedAt").is_some());
        let reloaded = SettingsStore::new().try_load(&repo).unwrap();
        assert!(reloaded.units.contains(&"kN".to_string()));
    }

    #[test]
    fn hash_ignores_timestamp() {
        let mut a = ReportingSettings::default();
        let b = a.clone();
        a.touch();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }
}
