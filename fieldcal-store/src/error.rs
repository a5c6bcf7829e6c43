//! Error types for fieldcal-store.

use std::path::PathBuf;

use thiserror::Error;

use fieldcal_core::{CoreError, Role, ValidationError};
use fieldcal_renderer::RenderError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A rejected edit. Never persisted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document at `path` exists but does not match its collection's shape.
    #[error("malformed document {collection}/{id}: {source}")]
    Malformed {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Collection names, document ids and blob paths must be plain relative
    /// segments.
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// Rejected before anything was read or written.
    #[error("{role} may not {action}")]
    PermissionDenied { role: Role, action: &'static str },

    /// Draft saves need a selected customer.
    #[error("select a customer before saving a draft")]
    NoCustomerSelected,

    /// Finalization needs customer, site, asset and a service date.
    #[error("report is not ready to finalize: customer, site, asset and service date are required")]
    NotFinalizable,

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
