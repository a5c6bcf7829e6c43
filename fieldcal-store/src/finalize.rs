//! Finalization and deletion of archival records.
//!
//! Finalize checks the target asset exists, then runs render, upload,
//! encode, append and mark-completed. Only a failed render or a failed
//! append aborts it. A failed upload leaves
//! `storageUrl` empty and a failed mark-completed is logged.

use fieldcal_core::{archive, ArchivalRecord, Role};
use fieldcal_renderer::{ReportContext, ReportRenderer};

use crate::blob::{report_blob_path, BlobStore};
use crate::directory::{missing_asset, Directory};
use crate::error::StoreError;
use crate::repository::DocumentRepository;
use crate::session::ReportSession;

/// Result of a successful finalization.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    pub record: ArchivalRecord,
    /// Why the document could not be stored, when it could not.
    pub upload_error: Option<String>,
    /// Whether an active draft was flipped to `completed`.
    pub draft_completed: bool,
}

impl ReportSession {
    pub fn finalize(
        &mut self,
        repo: &dyn DocumentRepository,
        blobs: &dyn BlobStore,
        renderer: &dyn ReportRenderer,
    ) -> Result<FinalizeOutcome, StoreError> {
        if !self.state.can_finalize() {
            return Err(StoreError::NotFinalizable);
        }
        let site_id = self.state.selection.site_id.clone();
        let asset_id = self.state.selection.asset_id.clone();
        let directory = Directory::new(repo);
        if directory.require_site(&site_id)?.asset(&asset_id).is_none() {
            return Err(missing_asset(&site_id, &asset_id));
        }

        let registry = self.catalog().registry();
        let ty = self.state.equipment_type(registry);
        let ctx = ReportContext::build(&self.state, self.catalog());
        let doc = renderer.render(&ty, &ctx)?;

        let (storage_url, upload_error) =
            match blobs.put(&report_blob_path(&asset_id, &doc.file_name), &doc.bytes) {
                Ok(url) => (Some(url), None),
                Err(e) => {
                    tracing::warn!("report upload failed, archiving without a document: {e}");
                    (None, Some(e.to_string()))
                }
            };

        let record = archive::encode(&self.state, registry, storage_url, &doc.file_name);
        directory.append_report(&site_id, &asset_id, record.clone())?;
        tracing::info!("finalized {} on {site_id}/{asset_id}", record.data.general.report_id);

        let mut draft_completed = false;
        if self.active_draft_id().is_some() {
            match self.save_draft(repo, true) {
                Ok(_) => draft_completed = true,
                Err(e) => tracing::warn!("could not mark draft completed: {e}"),
            }
        }

        Ok(FinalizeOutcome {
            record,
            upload_error,
            draft_completed,
        })
    }
}

/// Remove a finalized record from an asset and delete its stored document.
///
/// Only `Admin` may do this; anyone else is turned away before anything is
/// read. A failure deleting the document is logged.
pub fn delete_archived_report(
    actor: Role,
    repo: &dyn DocumentRepository,
    blobs: &dyn BlobStore,
    site_id: &str,
    asset_id: &str,
    record_id: i64,
) -> Result<ArchivalRecord, StoreError> {
    if actor != Role::Admin {
        return Err(StoreError::PermissionDenied {
            role: actor,
            action: "delete finalized reports",
        });
    }
    let removed = Directory::new(repo).remove_report(site_id, asset_id, record_id)?;
    if !removed.file_name.is_empty() {
        if let Err(e) = blobs.delete(&report_blob_path(asset_id, &removed.file_name)) {
            tracing::warn!("could not delete stored document {}: {e}", removed.file_name);
        }
    }
    tracing::info!("deleted report {record_id} from {site_id}/{asset_id}");
    Ok(removed)
}
