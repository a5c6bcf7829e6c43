//! Debounced background saving for a report session: one loop for the
//! draft, one for the settings bundle, and an optional watcher that picks up
//! settings written by other processes.

pub mod config;
mod debounce;
mod error;
mod runtime;

pub use config::{AutosaveConfig, DRAFT_AUTOSAVE_DELAY, SETTINGS_AUTOSAVE_DELAY};
pub use error::AutosaveError;
pub use runtime::{init_tracing, spawn, AutosaveHandle, SharedRepository, SharedSession};
