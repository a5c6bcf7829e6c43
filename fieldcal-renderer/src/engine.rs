//! Tera rendering engine: [`Layout`], [`TemplateEngine`] and the
//! [`ReportRenderer`] boundary.
//!
//! | Layout            | Used for                         | Template            |
//! |-------------------|----------------------------------|---------------------|
//! | `FixedCalibration`| the type with the fixed cal block | `fixed.html.tera`   |
//! | `Generic`         | every other type                 | `generic.html.tera` |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use fieldcal_core::{Catalog, EquipmentType, ReportFormState};

use crate::context::ReportContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("_partials/styles.html.tera", include_str!("templates/_partials/styles.html.tera")),
    ("_partials/header.html.tera", include_str!("templates/_partials/header.html.tera")),
    ("_partials/parties.html.tera", include_str!("templates/_partials/parties.html.tera")),
    ("_partials/macros.html.tera", include_str!("templates/_partials/macros.html.tera")),
    (
        "_partials/params_table.html.tera",
        include_str!("templates/_partials/params_table.html.tera"),
    ),
    ("_partials/comments.html.tera", include_str!("templates/_partials/comments.html.tera")),
    ("_partials/footer.html.tera", include_str!("templates/_partials/footer.html.tera")),
    ("fixed.html.tera", include_str!("templates/fixed.html.tera")),
    ("generic.html.tera", include_str!("templates/generic.html.tera")),
];

/// Content type of everything this crate produces.
pub const CONTENT_TYPE: &str = "text/html; charset=utf-8";

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(normalize_template_name(Path::new(name)), (*content).to_string());
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.autoescape_on(vec![".html.tera"]);
    // Partials are referenced by the layouts, so they must be registered in
    // one batch.
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Document layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Hand-laid belt weigher document with the calibration block.
    FixedCalibration,
    /// Schema-driven document assembled from steps, asset fields and the
    /// template's parameters.
    Generic,
}

impl Layout {
    pub fn all() -> &'static [Layout] {
        &[Layout::FixedCalibration, Layout::Generic]
    }

    pub fn for_type(ty: &EquipmentType) -> Self {
        if ty.has_fixed_cal {
            Layout::FixedCalibration
        } else {
            Layout::Generic
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            Layout::FixedCalibration => "fixed.html.tera",
            Layout::Generic => "generic.html.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera engine with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that replace embedded ones
/// by relative path (`fixed.html.tera`, `_partials/footer.html.tera`, ...).
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    pub fn render(&self, ctx: &ReportContext, layout: Layout) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        Ok(self.tera.render(layout.template_name(), &tera_ctx)?)
    }
}

// ---------------------------------------------------------------------------
// Renderer boundary
// ---------------------------------------------------------------------------

/// A rendered document ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// `render(equipment type, report data) -> bytes`. The layout is picked from
/// the equipment type.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, ty: &EquipmentType, report: &ReportContext) -> Result<RenderedReport, RenderError>;
}

/// HTML renderer over the embedded layouts.
pub struct Renderer {
    engine: TemplateEngine,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(None)? })
    }

    /// Embedded layouts plus overrides from `dir`.
    pub fn with_overrides(dir: &Path) -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(Some(dir))? })
    }

    /// Build the context from a form and render it.
    pub fn render_state(&self, state: &ReportFormState, catalog: &Catalog) -> Result<RenderedReport, RenderError> {
        let ty = state.equipment_type(catalog.registry());
        let ctx = ReportContext::build(state, catalog);
        ReportRenderer::render(self, &ty, &ctx)
    }
}

impl ReportRenderer for Renderer {
    fn render(&self, ty: &EquipmentType, report: &ReportContext) -> Result<RenderedReport, RenderError> {
        let html = self.engine.render(report, Layout::for_type(ty))?;
        Ok(RenderedReport {
            file_name: report.file_name.clone(),
            content_type: CONTENT_TYPE,
            bytes: html.into_bytes(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcal_core::equipment::TMD;

    fn html(r: &RenderedReport) -> &str {
        std::str::from_utf8(&r.bytes).unwrap()
    }

    #[test]
    fn renderer_new_succeeds() {
        Renderer::new().expect("embedded templates should parse");
    }

    #[test]
    fn layout_follows_fixed_cal_flag() {
        let c = Catalog::default();
        assert_eq!(Layout::for_type(&c.resolve("belt_weigher")), Layout::FixedCalibration);
        assert_eq!(Layout::for_type(&c.resolve(TMD)), Layout::Generic);
    }

    #[test]
    fn every_layout_renders_a_blank_form() {
        let c = Catalog::default();
        let engine = TemplateEngine::new(None).unwrap();
        let ctx = ReportContext::build(&ReportFormState::new(&c), &c);
        for layout in Layout::all() {
            let out = engine.render(&ctx, *layout).unwrap();
            assert!(out.contains("No comments recorded."), "{layout:?}");
            assert!(!out.contains('\r'));
        }
    }

    #[test]
    fn fixed_layout_shows_calibration_block() {
        let c = Catalog::default();
        let mut s = ReportFormState::new(&c);
        s.service.date = "2024-05-01".into();
        s.set_calibration("oz", "100").unwrap();
        s.set_calibration("nz", "98").unwrap();
        let out = Renderer::new().unwrap().render_state(&s, &c).unwrap();
        assert_eq!(out.content_type, CONTENT_TYPE);
        let body = html(&out);
        assert!(body.contains("Critical Calibration Errors"));
        assert!(body.contains("-2.00%"));
        assert!(body.contains("Integrator Data: Microtech 9101"));
    }

    #[test]
    fn generic_layout_omits_calibration_block() {
        let c = Catalog::default();
        let mut s = ReportFormState::new(&c);
        s.set_equipment_type(&c, TMD);
        let out = Renderer::new().unwrap().render_state(&s, &c).unwrap();
        let body = html(&out);
        assert!(!body.contains("Critical Calibration Errors"));
        assert!(body.contains("TMD Standard"));
        assert!(body.contains("Frame Condition:"));
    }

    #[test]
    fn user_text_is_escaped() {
        let c = Catalog::default();
        let mut s = ReportFormState::new(&c);
        s.customer.name = "<script>x</script>".into();
        s.comments = "line one\nline <two>".into();
        let out = Renderer::new().unwrap().render_state(&s, &c).unwrap();
        let body = html(&out);
        assert!(!body.contains("<script>x"));
        assert!(body.contains("&lt;script&gt;"));
        assert!(body.contains("line one<br>"));
        assert!(body.contains("line &lt;two&gt;"));
    }
}
