//! Report context: the serializable payload a layout renders, built from a
//! [`ReportFormState`] and the [`Catalog`] it was filled against.
//!
//! All derived values (report code, next service date, every `diff`/`pct`)
//! are computed here with the core helpers so layouts never do arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldcal_core::archive::APP_VERSION;
use fieldcal_core::{
    format_long_date, AssetFieldType, Catalog, Delta, EquipmentType, ParamKind, ParamValue,
    ReportFormState, NO_DATA,
};

use crate::error::RenderError;

/// Heading used for the parameter section when no template is selected.
pub const DEFAULT_PARAMS_HEADING: &str = "Calibration Data";

/// Rendering payload for one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    pub title: String,
    pub equipment_type: String,
    pub equipment_label: String,
    pub report_code: String,
    pub file_name: String,
    /// Raw `YYYY-MM-DD` service date.
    pub service_date: String,
    pub service_date_long: String,
    pub customer: CustomerCtx,
    pub service: ServiceCtx,
    /// Present only for types with the fixed calibration block.
    pub calibration: Option<CalibrationCtx>,
    pub params: ParamsCtx,
    /// Asset fields laid out two per row, in declaration order.
    pub asset_rows: Vec<Vec<FieldCell>>,
    pub comments: String,
    pub sections: Sections,
    pub meta: MetaCtx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerCtx {
    pub name: String,
    pub location: String,
    pub contacts: Vec<ContactCtx>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactCtx {
    pub label: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCtx {
    pub asset: String,
    pub conveyor: String,
    pub service_type: String,
    pub interval: String,
    pub job_number: String,
    /// Raw `YYYY-MM-DD`, or empty when the service date is unset.
    pub next_service_date: String,
    pub next_service_date_long: String,
    pub technicians: Vec<TechnicianCtx>,
}

/// One technician identity split on `" - "` into name and contact detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianCtx {
    pub label: String,
    pub name: String,
    /// `"phone  |  email"`, empty when neither is known.
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationCtx {
    pub tare: CalLine,
    pub span: CalLine,
    pub length: CalLine,
    pub speed: CalLine,
}

/// Old/new readings of one calibration quantity with its computed delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalLine {
    pub old: String,
    pub new: String,
    pub diff: String,
    pub pct: String,
    /// `pct` followed by `%`, or `"-"`.
    pub pct_label: String,
    /// Repeatability with `%`, or `"-"`. Only tare and span carry one.
    pub repeat: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsCtx {
    pub heading: String,
    pub pairs: Vec<PairRow>,
    /// Single-value parameters, two per row.
    pub values: Vec<Vec<FieldCell>>,
    /// Whether any pair opted into the percentage column.
    pub show_pct: bool,
}

/// An as-found/as-left parameter row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRow {
    pub name: String,
    pub unit: String,
    /// Reading or `"-"`.
    pub as_found: String,
    pub as_left: String,
    pub diff: String,
    pub pct: String,
    pub include_pct: bool,
    /// Reading with its unit, or `"-"`.
    pub as_found_label: String,
    pub as_left_label: String,
    pub change_label: String,
    /// `pct%` when opted in and computable, else `"-"`.
    pub pct_label: String,
}

/// A labelled value, optionally tinted (condition fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCell {
    pub label: String,
    pub value: String,
    pub color: Option<String>,
}

/// Which sections the type's steps call for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sections {
    pub calibration: bool,
    pub params: bool,
    pub comments: bool,
    pub asset_info: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCtx {
    pub generated_at: DateTime<Utc>,
    pub app_version: String,
}

const PARAM_STEPS: &[&str] = &["templateData", "intData", "tmdData"];

impl ReportContext {
    /// Build the context, stamped with the current time.
    pub fn build(state: &ReportFormState, catalog: &Catalog) -> Self {
        Self::build_at(state, catalog, Utc::now())
    }

    pub fn build_at(state: &ReportFormState, catalog: &Catalog, now: DateTime<Utc>) -> Self {
        let ty = state.equipment_type(catalog.registry());
        let report_code = state.report_code(catalog.registry());
        let next = state.next_service_date();
        let svc = &state.service;

        let calibration = match (&state.calibration, ty.has_fixed_cal) {
            (Some(cal), true) => {
                let d = cal.deltas();
                Some(CalibrationCtx {
                    tare: cal_line(&cal.old_tare, &cal.new_tare, &d.tare, Some(&cal.tare_repeatability)),
                    span: cal_line(&cal.old_span, &cal.new_span, &d.span, Some(&cal.span_repeatability)),
                    length: cal_line(&cal.old_length, &cal.new_length, &d.length, None),
                    speed: cal_line(&cal.old_speed, &cal.new_speed, &d.speed, None),
                })
            }
            _ => None,
        };

        Self {
            title: ty.pdf_title.clone(),
            equipment_type: ty.id.to_string(),
            equipment_label: ty.label.clone(),
            file_name: fieldcal_core::code::file_name(&report_code),
            report_code,
            service_date: svc.date.clone(),
            service_date_long: format_long_date(&svc.date),
            customer: customer_ctx(state),
            service: ServiceCtx {
                asset: svc.asset.clone(),
                conveyor: svc.cv.clone(),
                service_type: svc.service_type.clone(),
                interval: svc.interval.clone(),
                job_number: svc.job_number.clone(),
                next_service_date_long: format_long_date(&next),
                next_service_date: next,
                technicians: technicians(&svc.techs),
            },
            sections: Sections {
                calibration: calibration.is_some() && ty.has_step("calibration"),
                params: PARAM_STEPS.iter().any(|k| ty.has_step(k)),
                comments: ty.has_step("comments"),
                asset_info: ty.has_step("assetInfo") && !ty.asset_fields.is_empty(),
            },
            calibration,
            params: params_ctx(state),
            asset_rows: asset_rows(state, &ty, catalog),
            comments: state.comments.clone(),
            meta: MetaCtx {
                generated_at: now,
                app_version: APP_VERSION.to_string(),
            },
        }
    }

    /// Convert to a [`tera::Context`].
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        let ctx = tera::Context::from_serialize(self)?;
        Ok(ctx)
    }
}

fn or_dash(s: &str) -> String {
    if s.is_empty() {
        NO_DATA.to_string()
    } else {
        s.to_string()
    }
}

fn pct_label(pct: &str) -> String {
    if pct == NO_DATA {
        NO_DATA.to_string()
    } else {
        format!("{pct}%")
    }
}

fn with_unit(value: &str, unit: &str) -> String {
    if value == NO_DATA || unit.is_empty() {
        value.to_string()
    } else {
        format!("{value} {unit}")
    }
}

fn cal_line(old: &str, new: &str, delta: &Delta, repeat: Option<&String>) -> CalLine {
    CalLine {
        old: old.to_string(),
        new: new.to_string(),
        diff: delta.diff.clone(),
        pct: delta.pct.clone(),
        pct_label: pct_label(&delta.pct),
        repeat: match repeat {
            Some(r) if !r.is_empty() => format!("{r}%"),
            _ => NO_DATA.to_string(),
        },
    }
}

fn customer_ctx(state: &ReportFormState) -> CustomerCtx {
    let c = &state.customer;
    let mut contacts = vec![ContactCtx {
        label: "Contact".into(),
        name: c.contact1.clone(),
        email: c.email1.clone(),
        phone: c.phone1.clone(),
    }];
    if !c.contact2.is_empty() {
        contacts.push(ContactCtx {
            label: "Contact 2".into(),
            name: c.contact2.clone(),
            email: c.email2.clone(),
            phone: c.phone2.clone(),
        });
    }
    CustomerCtx {
        name: c.name.clone(),
        location: c.location.clone(),
        contacts,
    }
}

fn technicians(techs: &[String]) -> Vec<TechnicianCtx> {
    techs
        .iter()
        .enumerate()
        .map(|(i, tech)| {
            let mut parts = tech.split(" - ");
            let name = parts.next().unwrap_or_default().to_string();
            let detail: Vec<&str> = parts.take(2).filter(|p| !p.is_empty()).collect();
            TechnicianCtx {
                label: format!("Tech {}", i + 1),
                name,
                detail: detail.join("  |  "),
            }
        })
        .collect()
}

fn pair_row(name: &str, unit: &str, value: Option<&ParamValue>) -> PairRow {
    let (af, al, inc_pct) = match value {
        Some(ParamValue::Cal { af, al, inc_pct }) => (or_dash(af), or_dash(al), *inc_pct),
        _ => (NO_DATA.to_string(), NO_DATA.to_string(), false),
    };
    let d = fieldcal_core::diff(&af, &al);
    PairRow {
        name: name.to_string(),
        unit: unit.to_string(),
        as_found_label: with_unit(&af, unit),
        as_left_label: with_unit(&al, unit),
        change_label: with_unit(&d.diff, unit),
        pct_label: if inc_pct { pct_label(&d.pct) } else { NO_DATA.to_string() },
        as_found: af,
        as_left: al,
        diff: d.diff,
        pct: d.pct,
        include_pct: inc_pct,
    }
}

fn params_ctx(state: &ReportFormState) -> ParamsCtx {
    let mut pairs = Vec::new();
    let mut singles = Vec::new();

    match &state.selected_template {
        Some(t) => {
            for p in &t.params {
                let value = state.template_data.get(&p.id);
                match p.kind {
                    ParamKind::Cal => pairs.push(pair_row(&p.name, &p.unit, value)),
                    ParamKind::Val => singles.push(FieldCell {
                        label: p.name.clone(),
                        value: match value {
                            Some(ParamValue::Val { val }) => or_dash(val),
                            _ => NO_DATA.to_string(),
                        },
                        color: None,
                    }),
                }
            }
        }
        // Replayed records whose template no longer exists: the stored
        // shape is all that is left, so ids stand in for names.
        None => {
            for (id, value) in &state.template_data {
                match value {
                    ParamValue::Cal { .. } => pairs.push(pair_row(id.as_str(), "", Some(value))),
                    ParamValue::Val { val } => singles.push(FieldCell {
                        label: id.to_string(),
                        value: or_dash(val),
                        color: None,
                    }),
                }
            }
        }
    }

    ParamsCtx {
        heading: state
            .selected_template
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| DEFAULT_PARAMS_HEADING.to_string()),
        show_pct: pairs.iter().any(|p| p.include_pct),
        pairs,
        values: singles.chunks(2).map(<[FieldCell]>::to_vec).collect(),
    }
}

fn asset_rows(state: &ReportFormState, ty: &EquipmentType, catalog: &Catalog) -> Vec<Vec<FieldCell>> {
    let colors = &catalog.settings().condition_colors;
    let cells: Vec<FieldCell> = ty
        .asset_fields
        .iter()
        .map(|f| {
            let value = or_dash(state.asset_info.get(&f.key).map(String::as_str).unwrap_or_default());
            let color = match f.field_type {
                AssetFieldType::Condition => colors.get(&value).cloned(),
                _ => None,
            };
            FieldCell {
                label: f.label.clone(),
                value,
                color,
            }
        })
        .collect();
    cells.chunks(2).map(<[FieldCell]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fieldcal_core::equipment::TMD;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn belt_weigher_context_carries_derived_values() {
        let c = Catalog::default();
        let mut s = ReportFormState::new(&c);
        s.service.date = "2024-05-01".into();
        s.service.job_number = "1001".into();
        s.service.cv = "CV12".into();
        s.set_calibration("oz", "100").unwrap();
        s.set_calibration("nz", "98").unwrap();
        s.set_calibration("zr", "0.1").unwrap();

        let ctx = ReportContext::build_at(&s, &c, now());
        assert_eq!(ctx.report_code, "2024.05.01-CALR1001-CV12");
        assert_eq!(ctx.file_name, "2024.05.01-CALR1001-CV12.pdf");
        assert_eq!(ctx.service.next_service_date, "2024-08-01");
        assert_eq!(ctx.service.next_service_date_long, "Thursday, 1 August 2024");
        let cal = ctx.calibration.as_ref().unwrap();
        assert_eq!(cal.tare.diff, "-2.000");
        assert_eq!(cal.tare.pct_label, "-2.00%");
        assert_eq!(cal.tare.repeat, "0.1%");
        assert_eq!(cal.span.pct_label, "-");
        assert_eq!(cal.length.repeat, "-");
        assert!(ctx.sections.calibration);
        assert!(ctx.sections.params);
    }

    #[test]
    fn unset_values_stay_dashes_not_zero() {
        let c = Catalog::default();
        let mut s = ReportFormState::new(&c);
        s.set_param_as_found("p1", "5").unwrap();
        let ctx = ReportContext::build_at(&s, &c, now());
        let row = &ctx.params.pairs[0];
        assert_eq!(row.as_found, "5");
        assert_eq!(row.as_left, "-");
        assert_eq!(row.diff, "-");
        assert_eq!(row.change_label, "-");
        assert!(!ctx.params.show_pct);
        assert_eq!(ctx.service.next_service_date_long, "-");
        assert_eq!(ctx.service_date_long, "-");
    }

    #[test]
    fn pct_column_follows_opt_in() {
        let c = Catalog::default();
        let mut s = ReportFormState::new(&c);
        s.set_param_value("p2", ParamValue::cal("50", "55")).unwrap();
        s.toggle_param_pct("p2").unwrap();
        let ctx = ReportContext::build_at(&s, &c, now());
        let row = ctx.params.pairs.iter().find(|r| r.include_pct).unwrap();
        assert_eq!(row.pct_label, "10.00%");
        assert!(ctx.params.show_pct);
    }

    #[test]
    fn generic_type_splits_values_and_tints_conditions() {
        let mut c = Catalog::default();
        c.update(|s| s.set_condition_color("Good", Some("#2f855a")));
        let mut s = ReportFormState::new(&c);
        s.set_equipment_type(&c, TMD);
        s.set_param_value("t6", ParamValue::val("2.1")).unwrap();

        let ctx = ReportContext::build_at(&s, &c, now());
        assert!(ctx.calibration.is_none());
        assert!(!ctx.sections.calibration);
        assert_eq!(ctx.params.pairs.len(), 2);
        assert_eq!(ctx.params.values.iter().map(Vec::len).sum::<usize>(), 10);
        let first_val = &ctx.params.values[0][0];
        assert_eq!(first_val.value, "2.1");

        let cells: Vec<_> = ctx.asset_rows.iter().flatten().collect();
        assert_eq!(cells.len(), 4);
        let cond = cells.iter().find(|c| c.label == "Frame Condition").unwrap();
        assert_eq!(cond.value, "Good");
        assert_eq!(cond.color.as_deref(), Some("#2f855a"));
        assert!(cells.iter().filter(|c| c.label != "Frame Condition").all(|c| c.color.is_none()));
    }

    #[test]
    fn technicians_split_into_name_and_detail() {
        let techs = vec![
            "Caleb Bateman - 0475 666 667 - caleb@example.test".to_string(),
            "Adam Forrest".to_string(),
        ];
        let t = technicians(&techs);
        assert_eq!(t[0].name, "Caleb Bateman");
        assert_eq!(t[0].detail, "0475 666 667  |  caleb@example.test");
        assert_eq!(t[1].label, "Tech 2");
        assert_eq!(t[1].detail, "");
    }

    #[test]
    fn second_contact_only_when_named() {
        let c = Catalog::default();
        let mut s = ReportFormState::new(&c);
        s.customer.email2 = "x@example.test".into();
        assert_eq!(ReportContext::build_at(&s, &c, now()).customer.contacts.len(), 1);
        s.customer.contact2 = "Jo".into();
        assert_eq!(ReportContext::build_at(&s, &c, now()).customer.contacts.len(), 2);
    }
}
