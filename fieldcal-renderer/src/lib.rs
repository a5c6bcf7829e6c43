//! # fieldcal-renderer
//!
//! Tera-based document renderer for finalized service reports. One layout per
//! kind of equipment type: the fixed calibration layout and a generic layout
//! driven by the type's steps, asset fields and template parameters.
//!
//! ```rust,no_run
//! use fieldcal_core::{Catalog, ReportFormState};
//! use fieldcal_renderer::Renderer;
//!
//! fn render(state: &ReportFormState, catalog: &Catalog) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(doc) = renderer.render_state(state, catalog) {
//!             println!("{}: {} bytes", doc.file_name, doc.bytes.len());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::ReportContext;
pub use engine::{Layout, RenderedReport, ReportRenderer, Renderer, TemplateEngine};
pub use error::RenderError;
