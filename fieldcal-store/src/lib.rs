//! # fieldcal-store
//!
//! Persistence for the report editor: a document repository and blob store
//! (filesystem and in-memory), the customer/site directory, the settings
//! bundle, draft sessions and the finalization pipeline.
//!
//! Fallible functions return [`StoreError`]. Background paths (autosave,
//! upload during finalize) log with `warn` and carry on.

pub mod blob;
pub mod directory;
pub mod error;
pub mod finalize;
pub mod paths;
pub mod repository;
pub mod session;
pub mod settings;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use directory::Directory;
pub use error::StoreError;
pub use finalize::{delete_archived_report, FinalizeOutcome};
pub use repository::{DocumentRepository, FsRepository, MemoryRepository};
pub use session::{list_drafts, load_draft, ReportSession, SessionUser};
pub use settings::{SaveOutcome, SettingsStore};
