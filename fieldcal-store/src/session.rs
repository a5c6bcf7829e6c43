//! One editing session: the form, the catalog it is filled against, and the
//! draft row it is being saved into.
//!
//! [`ReportSession::save_draft`] is the only writer of the active draft id.
//! The first save creates a row and later saves update it in place.

use chrono::Utc;

use fieldcal_core::{
    ArchivalRecord, Catalog, DirectorySelection, Draft, DraftId, DraftStatus, ReportFormState,
    ReportingSettings, Role,
};

use crate::directory::Directory;
use crate::error::StoreError;
use crate::repository::{get_typed, list_typed, save_typed, DocumentRepository, DRAFTS};
use crate::settings::{content_hash, SaveOutcome, SettingsStore};

/// Who is driving the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub role: Role,
}

impl SessionUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}

pub struct ReportSession {
    catalog: Catalog,
    pub state: ReportFormState,
    active_draft_id: Option<DraftId>,
    user: SessionUser,
    settings_store: SettingsStore,
}

impl ReportSession {
    /// Start a session: load the settings bundle (defaults on failure) and
    /// open a blank form.
    pub fn open(repo: &dyn DocumentRepository, user: SessionUser) -> Self {
        let settings_store = SettingsStore::new();
        let settings = settings_store.load(repo);
        let mut session = Self::with_settings(settings, user);
        session.settings_store = settings_store;
        session
    }

    pub fn with_settings(settings: ReportingSettings, user: SessionUser) -> Self {
        let catalog = Catalog::new(settings);
        for id in catalog.rejected_custom_types() {
            tracing::warn!("custom equipment type {id} rejected by the registry");
        }
        let state = ReportFormState::new(&catalog);
        Self {
            catalog,
            state,
            active_draft_id: None,
            user,
            settings_store: SettingsStore::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The form for editing alongside the catalog it is checked against.
    pub fn form_mut(&mut self) -> (&mut ReportFormState, &Catalog) {
        (&mut self.state, &self.catalog)
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn active_draft_id(&self) -> Option<&DraftId> {
        self.active_draft_id.as_ref()
    }

    /// Drafts are only ever created once a customer is chosen.
    pub fn has_customer(&self) -> bool {
        !self.state.selection.customer_id.is_empty()
    }

    // -----------------------------------------------------------------------
    // Drafts
    // -----------------------------------------------------------------------

    /// Save the form into the active draft row, creating it on first save.
    /// `mark_completed` flips the row to `completed`; it is never deleted.
    pub fn save_draft(
        &mut self,
        repo: &dyn DocumentRepository,
        mark_completed: bool,
    ) -> Result<Draft, StoreError> {
        let status = if mark_completed {
            DraftStatus::Completed
        } else {
            DraftStatus::Draft
        };
        let now = Utc::now();
        let mut draft = Draft::from_state(&self.state, &self.user.id, status);
        draft.updated_at = Some(now);
        draft.created_at = Some(now);

        if let Some(id) = &self.active_draft_id {
            draft.id = Some(id.clone());
            if let Ok(Some(existing)) = get_typed::<Draft>(repo, DRAFTS, id.as_str()) {
                draft.created_at = existing.created_at.or(draft.created_at);
                if !existing.created_by.is_empty() {
                    draft.created_by = existing.created_by;
                }
            }
        }

        let stored = save_typed(repo, DRAFTS, &draft)?;
        if let Some(id) = &stored.id {
            if self.active_draft_id.as_ref() != Some(id) {
                tracing::info!("draft {id} created");
            }
            self.active_draft_id = Some(id.clone());
        }
        Ok(stored)
    }

    /// Explicit "Save Draft". Needs a selected customer; errors reach the
    /// caller.
    pub fn manual_save(&mut self, repo: &dyn DocumentRepository) -> Result<Draft, StoreError> {
        if !self.has_customer() {
            return Err(StoreError::NoCustomerSelected);
        }
        self.save_draft(repo, false)
    }

    /// Background save. Skipped without a customer; failures are logged and
    /// swallowed.
    pub fn autosave(&mut self, repo: &dyn DocumentRepository) -> Option<Draft> {
        if !self.has_customer() {
            tracing::debug!("autosave skipped: no customer selected");
            return None;
        }
        match self.save_draft(repo, false) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!("autosave failed: {e}");
                None
            }
        }
    }

    /// Continue editing `draft`; later saves update its row.
    pub fn resume(&mut self, draft: &Draft) {
        self.state = draft.to_state(&self.catalog);
        self.active_draft_id = draft.id.clone();
    }

    pub fn resume_by_id(&mut self, repo: &dyn DocumentRepository, id: &str) -> Result<(), StoreError> {
        let draft = load_draft(repo, id)?;
        self.resume(&draft);
        Ok(())
    }

    /// Delete a draft row. Deleting the active one unlinks it so the next save
    /// creates a fresh row.
    pub fn delete_draft(&mut self, repo: &dyn DocumentRepository, id: &str) -> Result<(), StoreError> {
        repo.delete(DRAFTS, id)?;
        if self.active_draft_id.as_ref().map(DraftId::as_str) == Some(id) {
            self.active_draft_id = None;
        }
        tracing::info!("draft {id} deleted");
        Ok(())
    }

    /// Blank form, no active draft.
    pub fn reset(&mut self) {
        self.state.reset(&self.catalog);
        self.active_draft_id = None;
    }

    // -----------------------------------------------------------------------
    // Directory
    // -----------------------------------------------------------------------

    /// Seed customer and service fields from the directory.
    pub fn select_asset(
        &mut self,
        repo: &dyn DocumentRepository,
        site_id: &str,
        asset_id: &str,
    ) -> Result<(), StoreError> {
        let dir = Directory::new(repo);
        let site = dir.require_site(site_id)?;
        let customer = dir.customer(&site.customer_id)?;
        let asset = site.asset(asset_id).cloned();
        self.state
            .load_from_asset(customer.as_ref(), Some(&site), asset.as_ref());
        Ok(())
    }

    /// Pre-fill from the asset's most recent record. Returns `false` when the
    /// asset has no history.
    pub fn copy_forward(
        &mut self,
        repo: &dyn DocumentRepository,
        site_id: &str,
        asset_id: &str,
    ) -> Result<bool, StoreError> {
        let Some(record) = Directory::new(repo).latest_report(site_id, asset_id)? else {
            return Ok(false);
        };
        self.state.copy_forward(&self.catalog, &record);
        Ok(true)
    }

    /// Open a finalized record in the editor. The session is unlinked from
    /// any draft, so a later save starts a new row.
    pub fn view_archived(&mut self, record: &ArchivalRecord, selection: DirectorySelection) {
        self.state = ReportFormState::from_archived(&self.catalog, record, selection);
        self.active_draft_id = None;
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    /// Edit the settings bundle. The registry follows every change.
    pub fn update_settings<R>(&mut self, f: impl FnOnce(&mut ReportingSettings) -> R) -> R {
        self.catalog.update(f)
    }

    pub fn replace_settings(&mut self, settings: ReportingSettings) {
        self.catalog.replace_settings(settings);
    }

    pub fn save_settings(&self, repo: &dyn DocumentRepository) -> Result<SaveOutcome, StoreError> {
        self.settings_store.save(repo, self.catalog.settings())
    }

    /// Adopt the stored bundle when it differs from the one in memory and
    /// report whether it did. The save gate is re-keyed to the stored content,
    /// so an unedited session does not write it back.
    pub fn reload_settings(&mut self, repo: &dyn DocumentRepository) -> Result<bool, StoreError> {
        let stored = self.settings_store.try_load(repo)?;
        if content_hash(&stored)? == content_hash(self.catalog.settings())? {
            return Ok(false);
        }
        self.catalog.replace_settings(stored);
        Ok(true)
    }
}

pub fn load_draft(repo: &dyn DocumentRepository, id: &str) -> Result<Draft, StoreError> {
    get_typed(repo, DRAFTS, id)?.ok_or_else(|| StoreError::NotFound {
        collection: DRAFTS.to_string(),
        id: id.to_string(),
    })
}

/// Drafts, most recently updated first. Completed rows are left out unless
/// `include_completed`.
pub fn list_drafts(repo: &dyn DocumentRepository, include_completed: bool) -> Result<Vec<Draft>, StoreError> {
    let mut drafts: Vec<Draft> = list_typed(repo, DRAFTS)?;
    drafts.retain(|d| include_completed || d.is_resumable());
    drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn session() -> ReportSession {
        ReportSession::with_settings(ReportingSettings::default(), SessionUser::new("tech-1", Role::Technician))
    }

    #[test]
    fn reloaded_settings_are_not_written_back() {
        let repo = MemoryRepository::new();
        let mut s = session();
        let mut foreign = ReportingSettings::default();
        foreign.add_unit("Nm").unwrap();
        SettingsStore::new().save(&repo, &foreign).unwrap();

        assert!(s.reload_settings(&repo).unwrap());
        assert!(s.catalog().settings().units.contains(&"Nm".to_string()));
        assert_eq!(s.save_settings(&repo).unwrap(), SaveOutcome::Unchanged);
        assert!(!s.reload_settings(&repo).unwrap());

        s.update_settings(|st| st.add_unit("kN")).unwrap();
        assert!(matches!(s.save_settings(&repo).unwrap(), SaveOutcome::Written { .. }));
    }

    #[test]
    fn consecutive_saves_update_one_row() {
        let repo = MemoryRepository::new();
        let mut s = session();
        s.state.selection.customer_id = "c1".into();
        let first = s.save_draft(&repo, false).unwrap();
        s.state.comments = "more".into();
        let second = s.save_draft(&repo, false).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(repo.get_all(DRAFTS).unwrap().len(), 1);
        assert_eq!(list_drafts(&repo, false).unwrap()[0].comments, "more");
    }

    #[test]
    fn autosave_needs_a_customer() {
        let repo = MemoryRepository::new();
        let mut s = session();
        assert!(s.autosave(&repo).is_none());
        assert!(matches!(s.manual_save(&repo), Err(StoreError::NoCustomerSelected)));
        assert!(repo.get_all(DRAFTS).unwrap().is_empty());

        s.state.selection.customer_id = "c1".into();
        assert!(s.autosave(&repo).is_some());
        assert!(s.active_draft_id().is_some());
    }

    #[test]
    fn deleting_active_draft_unlinks_it() {
        let repo = MemoryRepository::new();
        let mut s = session();
        s.state.selection.customer_id = "c1".into();
        let d = s.save_draft(&repo, false).unwrap();
        let id = d.id.clone().unwrap();
        s.delete_draft(&repo, id.as_str()).unwrap();
        assert!(s.active_draft_id().is_none());

        let fresh = s.save_draft(&repo, false).unwrap();
        assert_ne!(fresh.id, Some(id));
        assert_eq!(repo.get_all(DRAFTS).unwrap().len(), 1);
    }

    #[test]
    fn completed_drafts_drop_out_of_listings() {
        let repo = MemoryRepository::new();
        let mut s = session();
        s.state.selection.customer_id = "c1".into();
        s.save_draft(&repo, true).unwrap();
        assert!(list_drafts(&repo, false).unwrap().is_empty());
        let all = list_drafts(&repo, true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, DraftStatus::Completed);
    }

    #[test]
    fn resume_links_future_saves_to_that_row() {
        let repo = MemoryRepository::new();
        let mut a = session();
        a.state.selection.customer_id = "c1".into();
        a.state.comments = "started".into();
        let d = a.save_draft(&repo, false).unwrap();

        let mut b = session();
        b.resume_by_id(&repo, d.id.as_ref().unwrap().as_str()).unwrap();
        assert_eq!(b.state.comments, "started");
        b.state.comments = "continued".into();
        let again = b.save_draft(&repo, false).unwrap();
        assert_eq!(again.id, d.id);
        assert_eq!(repo.get_all(DRAFTS).unwrap().len(), 1);
        assert!(matches!(b.resume_by_id(&repo, "missing"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn reset_clears_form_and_link() {
        let repo = MemoryRepository::new();
        let mut s = session();
        s.state.selection.customer_id = "c1".into();
        s.state.comments = "x".into();
        s.save_draft(&repo, false).unwrap();
        s.reset();
        assert!(s.active_draft_id().is_none());
        assert!(s.state.comments.is_empty());
    }

    #[test]
    fn settings_changes_are_saved_once() {
        let repo = MemoryRepository::new();
        let mut s = session();
        s.update_settings(|st| st.add_unit("kN")).unwrap();
        assert!(matches!(s.save_settings(&repo).unwrap(), SaveOutcome::Written { .. }));
        assert_eq!(s.save_settings(&repo).unwrap(), SaveOutcome::Unchanged);

        let reopened = ReportSession::open(&repo, SessionUser::new("u2", Role::Manager));
        assert!(reopened.catalog().settings().units.contains(&"kN".to_string()));
    }
}
