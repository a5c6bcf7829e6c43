//! Rendering through the public API: layouts, custom types, overrides and
//! archived-record replays.

use chrono::{TimeZone, Utc};
use fieldcal_core::{
    archive, AssetField, AssetFieldType, Catalog, EquipmentTypeDraft, ParamValue, ReportFormState,
};
use fieldcal_renderer::{Layout, ReportContext, ReportRenderer, Renderer, TemplateEngine};
use rstest::rstest;

fn body(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn filled(catalog: &Catalog) -> ReportFormState {
    let mut s = ReportFormState::new(catalog);
    s.customer.name = "Acme Quarries".into();
    s.customer.location = "North Pit".into();
    s.service.date = "2024-05-01".into();
    s.service.job_number = "1001".into();
    s.service.cv = "CV12".into();
    s.service.techs = vec!["Caleb Bateman - 0475 666 667 - caleb@example.test".into()];
    s
}

#[test]
fn report_code_and_next_service_are_rendered_verbatim() {
    let c = Catalog::default();
    let s = filled(&c);
    let doc = Renderer::new().unwrap().render_state(&s, &c).unwrap();
    assert_eq!(doc.file_name, "2024.05.01-CALR1001-CV12.pdf");
    let html = body(&doc.bytes);
    assert!(html.contains("2024.05.01-CALR1001-CV12"));
    assert!(html.contains("Wednesday, 1 May 2024"));
    assert!(html.contains("Thursday, 1 August 2024"));
    assert!(html.contains("Caleb Bateman"));
    assert!(html.contains("0475 666 667  |  caleb@example.test"));
}

#[rstest]
#[case("", "5", "-")]
#[case("abc", "5", "-")]
#[case("10", "12", "2.000")]
fn pair_changes_keep_sentinels(#[case] af: &str, #[case] al: &str, #[case] expected: &str) {
    let c = Catalog::default();
    let mut s = filled(&c);
    s.set_equipment_type(&c, "tmd");
    let first = s.selected_template.as_ref().unwrap().params[0].id.clone();
    s.set_param_value(first.as_str(), ParamValue::cal(af, al)).unwrap();
    let ctx = ReportContext::build(&s, &c);
    let row = &ctx.params.pairs[0];
    assert_eq!(row.diff, expected);
    let html = TemplateEngine::new(None).unwrap().render(&ctx, Layout::Generic).unwrap();
    assert!(html.contains(&format!("Change:</span><span>{expected}</span>")));
}

#[test]
fn custom_type_renders_with_generic_layout() {
    let mut c = Catalog::default();
    let id = c
        .add_custom_equipment_type(EquipmentTypeDraft {
            label: "Moisture Meter".into(),
            short_label: "MM".into(),
            report_code_prefix: "MMR".into(),
            asset_fields: vec![
                AssetField::new("probe", "Probe", AssetFieldType::Text, None),
                AssetField::new("probeCond", "Probe Condition", AssetFieldType::Condition, None),
                AssetField::new("mount", "Mount", AssetFieldType::Text, None),
            ],
            steps: vec!["assetInfo".into(), "comments".into()],
            ..Default::default()
        })
        .unwrap();
    c.update(|s| s.set_condition_color("Good", Some("#2f855a")));

    let mut s = filled(&c);
    s.set_equipment_type(&c, id.as_str());
    s.set_asset_field(c.registry(), "probe", "NIR").unwrap();

    let ty = c.resolve(id.as_str());
    let ctx = ReportContext::build(&s, &c);
    assert_eq!(ctx.asset_rows.len(), 2);
    assert!(!ctx.sections.params);

    let doc = ReportRenderer::render(&Renderer::new().unwrap(), &ty, &ctx).unwrap();
    let html = body(&doc.bytes);
    assert!(html.contains("Moisture Meter Report"));
    assert!(html.contains("-MMR1001-"));
    assert!(html.contains("color: #2f855a"));
    assert!(html.contains("NIR"));
    assert!(!html.contains("Integrator Data"));
}

#[test]
fn override_dir_replaces_embedded_partial() {
    let dir = tempfile::tempdir().unwrap();
    let partials = dir.path().join("_partials");
    std::fs::create_dir_all(&partials).unwrap();
    std::fs::write(partials.join("footer.html.tera"), "<footer>Custom {{ report_code }}</footer>").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let c = Catalog::default();
    let doc = Renderer::with_overrides(dir.path()).unwrap().render_state(&filled(&c), &c).unwrap();
    assert!(body(&doc.bytes).contains("<footer>Custom 2024.05.01-CALR1001-CV12</footer>"));
}

#[test]
fn missing_override_dir_uses_embedded_layouts() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TemplateEngine::new(Some(&dir.path().join("absent")));
    assert!(engine.is_ok());
}

#[test]
fn broken_override_is_a_render_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("generic.html.tera"), "{% if %}").unwrap();
    assert!(Renderer::with_overrides(dir.path()).is_err());
}

#[test]
fn archived_record_with_deleted_template_still_renders() {
    let mut c = Catalog::default();
    let dup = c.update(|s| s.duplicate_template("tpl_mt9101")).unwrap();
    let mut s = filled(&c);
    s.select_template_by_id(&c, dup.as_str()).unwrap();
    let first = s.selected_template.as_ref().unwrap().params[0].id.clone();
    s.set_param_value(first.as_str(), ParamValue::cal("1", "3")).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let record = archive::encode_at(&s, c.registry(), None, "x.pdf", now);

    c.update(|s| s.delete_template(dup.as_str())).unwrap();
    let replay = ReportFormState::from_archived(&c, &record, s.selection.clone());
    let ctx = ReportContext::build_at(&replay, &c, now);
    assert_eq!(ctx.params.heading, "Calibration Data");
    let row = ctx.params.pairs.iter().find(|r| r.name == first.as_str()).unwrap();
    assert_eq!(row.diff, "2.000");
    assert!(TemplateEngine::new(None).unwrap().render(&ctx, Layout::FixedCalibration).is_ok());
}
