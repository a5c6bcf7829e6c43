//! Archival record format and the mapping to and from the form.
//!
//! Records are appended to an asset's report list at finalization and read by
//! downstream analytics, so field names follow that consumer. Integrator
//! entries describe their own shape, which lets a record be replayed into the
//! editor after its template was edited or deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::calibration::Calibration;
use crate::catalog::Catalog;
use crate::code;
use crate::equipment::{EquipmentTypeRegistry, DEFAULT_EQUIPMENT_TYPE};
use crate::form::{
    default_interval, default_service_type, rebuild_template_data, CustomerInfo,
    DirectorySelection, ReportFormState, ServiceInfo,
};
use crate::template::{ParamKind, ParamValue};
use crate::types::{EquipmentTypeId, ParamId};

pub const RECORD_KIND: &str = "Full Service";
pub const APP_VERSION: &str = "v2";

/// A finalized report stored against an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivalRecord {
    /// Milliseconds since the epoch at creation. Older rows store it as a
    /// numeric string.
    #[serde(deserialize_with = "record_id")]
    pub id: i64,
    /// Older rows store a bare `YYYY-MM-DD`, read as midnight UTC.
    #[serde(deserialize_with = "record_date")]
    pub date: DateTime<Utc>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub file_name: String,
    /// `None` when the upload failed.
    #[serde(default)]
    pub storage_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub job_number: String,
    pub data: ReportData,
    /// Keys this crate does not model, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_kind() -> String {
    RECORD_KIND.to_string()
}

fn record_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(n) => Ok(n),
        RawId::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        RawId::Float(f) => Err(de::Error::custom(format!("record id {f} is not an integer"))),
        RawId::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("record id {s:?} is not numeric"))),
    }
}

fn record_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(at.with_timezone(&Utc));
    }
    crate::utils::parse_date(&raw)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| de::Error::custom(format!("unrecognised record date {raw:?}")))
}

/// `null` reads as `""`.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    /// Missing on records written before equipment types existed.
    #[serde(default = "default_record_type")]
    pub equipment_type: EquipmentTypeId,
    #[serde(default)]
    pub general: GeneralSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationSection>,
    #[serde(default)]
    pub integrator: Vec<IntegratorEntry>,
    #[serde(default)]
    pub asset_info: BTreeMap<String, String>,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub app_version: String,
}

fn default_record_type() -> EquipmentTypeId {
    EquipmentTypeId::from(DEFAULT_EQUIPMENT_TYPE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSection {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub report_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub customer_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub site_location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_phone1: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_name2: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_email2: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_phone2: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub asset_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub conveyor_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub service_date: String,
    #[serde(default = "default_service_type", deserialize_with = "null_as_empty")]
    pub service_type: String,
    #[serde(default = "default_interval", deserialize_with = "null_as_empty")]
    pub interval: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub next_service_date: String,
    /// Comma-joined display names.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub technicians: String,
    /// Full technician identities. Absent on older records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub techs_full: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: String,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            report_id: String::new(),
            customer_name: String::new(),
            site_location: String::new(),
            contact_name: String::new(),
            contact_email: String::new(),
            contact_phone1: String::new(),
            contact_name2: String::new(),
            contact_email2: String::new(),
            contact_phone2: String::new(),
            asset_name: String::new(),
            conveyor_number: String::new(),
            service_date: String::new(),
            service_type: default_service_type(),
            interval: default_interval(),
            next_service_date: String::new(),
            technicians: String::new(),
            techs_full: None,
            comments: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationSection {
    pub old_tare: String,
    pub new_tare: String,
    pub tare_change: String,
    pub tare_repeatability: String,
    pub old_span: String,
    pub new_span: String,
    pub span_change: String,
    pub span_repeatability: String,
    pub old_length: String,
    pub new_length: String,
    pub length_diff: String,
    pub length_change: String,
    pub old_speed: String,
    pub new_speed: String,
    pub speed_diff: String,
    pub speed_change: String,
}

impl CalibrationSection {
    fn from_calibration(cal: &Calibration) -> Self {
        let d = cal.deltas();
        Self {
            old_tare: cal.old_tare.clone(),
            new_tare: cal.new_tare.clone(),
            tare_change: d.tare.pct,
            tare_repeatability: cal.tare_repeatability.clone(),
            old_span: cal.old_span.clone(),
            new_span: cal.new_span.clone(),
            span_change: d.span.pct,
            span_repeatability: cal.span_repeatability.clone(),
            old_length: cal.old_length.clone(),
            new_length: cal.new_length.clone(),
            length_diff: d.length.diff,
            length_change: d.length.pct,
            old_speed: cal.old_speed.clone(),
            new_speed: cal.new_speed.clone(),
            speed_diff: d.speed.diff,
            speed_change: d.speed.pct,
        }
    }

    fn to_calibration(&self) -> Calibration {
        Calibration {
            old_tare: self.old_tare.clone(),
            new_tare: self.new_tare.clone(),
            old_span: self.old_span.clone(),
            new_span: self.new_span.clone(),
            tare_repeatability: self.tare_repeatability.clone(),
            span_repeatability: self.span_repeatability.clone(),
            old_length: self.old_length.clone(),
            new_length: self.new_length.clone(),
            old_speed: self.old_speed.clone(),
            new_speed: self.new_speed.clone(),
        }
    }
}

/// One template parameter result.
///
/// Pair entries carry `asFound`/`asLeft`/`diff`/`percentChange`; single
/// values carry `value`. Older records have no `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratorEntry {
    pub id: ParamId,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ParamKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_found: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_pct: Option<bool>,
}

/// Shape of a stored entry, decided from which keys are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    Single,
    Pair,
}

impl IntegratorEntry {
    pub fn shape(&self) -> EntryShape {
        if self.value.is_some() {
            EntryShape::Single
        } else if self.as_found.is_some() || self.as_left.is_some() {
            EntryShape::Pair
        } else {
            match self.kind {
                Some(ParamKind::Val) => EntryShape::Single,
                _ => EntryShape::Pair,
            }
        }
    }

    pub fn to_param_value(&self) -> ParamValue {
        match self.shape() {
            EntryShape::Single => ParamValue::Val {
                val: self.value.clone().unwrap_or_default(),
            },
            EntryShape::Pair => ParamValue::Cal {
                af: self.as_found.clone().unwrap_or_default(),
                al: self.as_left.clone().unwrap_or_default(),
                inc_pct: self.include_pct.unwrap_or(false),
            },
        }
    }
}

/// Form groups recovered from a record. `service.date` and
/// `service.job_number` are always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReport {
    pub equipment_type: EquipmentTypeId,
    pub customer: CustomerInfo,
    pub service: ServiceInfo,
    pub calibration: Option<Calibration>,
    pub comments: String,
    pub asset_info: BTreeMap<String, String>,
    pub template_data: BTreeMap<ParamId, ParamValue>,
    pub template_name: String,
}

/// Build the archival record for `state`, timestamped now.
pub fn encode(
    state: &ReportFormState,
    registry: &EquipmentTypeRegistry,
    storage_url: Option<String>,
    file_name: &str,
) -> ArchivalRecord {
    encode_at(state, registry, storage_url, file_name, Utc::now())
}

pub fn encode_at(
    state: &ReportFormState,
    registry: &EquipmentTypeRegistry,
    storage_url: Option<String>,
    file_name: &str,
    now: DateTime<Utc>,
) -> ArchivalRecord {
    let ty = state.equipment_type(registry);
    let cust = &state.customer;
    let svc = &state.service;

    let general = GeneralSection {
        report_id: code::generate(svc, ty.id.as_str(), registry),
        customer_name: cust.name.clone(),
        site_location: cust.location.clone(),
        contact_name: cust.contact1.clone(),
        contact_email: cust.email1.clone(),
        contact_phone1: cust.phone1.clone(),
        contact_name2: cust.contact2.clone(),
        contact_email2: cust.email2.clone(),
        contact_phone2: cust.phone2.clone(),
        asset_name: svc.asset.clone(),
        conveyor_number: svc.cv.clone(),
        service_date: svc.date.clone(),
        service_type: svc.service_type.clone(),
        interval: svc.interval.clone(),
        next_service_date: state.next_service_date(),
        technicians: svc.technician_names().join(", "),
        techs_full: Some(svc.techs.clone()),
        comments: state.comments.clone(),
    };

    let calibration = ty.has_fixed_cal.then(|| {
        let cal = state.calibration.clone().unwrap_or_default();
        CalibrationSection::from_calibration(&cal)
    });

    let integrator = state
        .selected_template
        .iter()
        .flat_map(|t| t.params.iter())
        .map(|p| {
            let stored = state.template_data.get(&p.id);
            match p.kind {
                ParamKind::Val => {
                    let value = match stored {
                        Some(ParamValue::Val { val }) => val.clone(),
                        _ => String::new(),
                    };
                    IntegratorEntry {
                        id: p.id.clone(),
                        label: p.label(),
                        kind: Some(ParamKind::Val),
                        value: Some(value),
                        as_found: None,
                        as_left: None,
                        diff: None,
                        percent_change: None,
                        include_pct: None,
                    }
                }
                ParamKind::Cal => {
                    let (af, al, inc_pct) = match stored {
                        Some(ParamValue::Cal { af, al, inc_pct }) => (af.clone(), al.clone(), *inc_pct),
                        _ => (String::new(), String::new(), false),
                    };
                    let d = crate::utils::diff(&af, &al);
                    IntegratorEntry {
                        id: p.id.clone(),
                        label: p.label(),
                        kind: Some(ParamKind::Cal),
                        value: None,
                        as_found: Some(af),
                        as_left: Some(al),
                        diff: Some(d.diff),
                        percent_change: Some(d.pct),
                        include_pct: Some(inc_pct),
                    }
                }
            }
        })
        .collect();

    let job_number = if svc.job_number.is_empty() {
        svc.cv.clone()
    } else {
        svc.job_number.clone()
    };

    ArchivalRecord {
        id: now.timestamp_millis(),
        date: now,
        kind: RECORD_KIND.to_string(),
        file_name: file_name.to_string(),
        storage_url,
        job_number,
        extra: Map::new(),
        data: ReportData {
            equipment_type: ty.id.clone(),
            general,
            calibration,
            integrator,
            asset_info: state.asset_info.clone(),
            template_name: state
                .selected_template
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            app_version: APP_VERSION.to_string(),
        },
    }
}

/// Recover the editable form groups from a record.
pub fn decode(record: &ArchivalRecord, registry: &EquipmentTypeRegistry) -> DecodedReport {
    let data = &record.data;
    let g = &data.general;
    let ty = registry.resolve(data.equipment_type.as_str());

    let techs = match &g.techs_full {
        Some(full) => full.clone(),
        None => g
            .technicians
            .split(", ")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let calibration = ty.has_fixed_cal.then(|| {
        data.calibration
            .as_ref()
            .map(CalibrationSection::to_calibration)
            .unwrap_or_default()
    });

    let mut asset_info = ty.default_ast.clone();
    for (key, value) in asset_info.iter_mut() {
        if let Some(v) = data.asset_info.get(key) {
            value.clone_from(v);
        }
    }

    let template_data = data
        .integrator
        .iter()
        .map(|e| (e.id.clone(), e.to_param_value()))
        .collect();

    DecodedReport {
        equipment_type: ty.id.clone(),
        customer: CustomerInfo {
            name: g.customer_name.clone(),
            location: g.site_location.clone(),
            contact1: g.contact_name.clone(),
            email1: g.contact_email.clone(),
            phone1: g.contact_phone1.clone(),
            contact2: g.contact_name2.clone(),
            email2: g.contact_email2.clone(),
            phone2: g.contact_phone2.clone(),
        },
        service: ServiceInfo {
            asset: g.asset_name.clone(),
            cv: g.conveyor_number.clone(),
            service_type: g.service_type.clone(),
            interval: g.interval.clone(),
            date: String::new(),
            techs,
            job_number: String::new(),
        },
        calibration,
        comments: g.comments.clone(),
        asset_info,
        template_data,
        template_name: data.template_name.clone(),
    }
}

impl ReportFormState {
    /// "Copy last report": seed this report from a prior record. The service
    /// date is left blank and the directory selection is kept.
    pub fn copy_forward(&mut self, catalog: &Catalog, record: &ArchivalRecord) {
        let decoded = decode(record, catalog.registry());
        self.apply_decoded(catalog, decoded);
        self.service.date.clear();
    }

    /// "View in editor": a fresh, unsaved report holding a record's data,
    /// including its original service date.
    pub fn from_archived(catalog: &Catalog, record: &ArchivalRecord, selection: DirectorySelection) -> Self {
        let mut state = Self::new(catalog);
        let decoded = decode(record, catalog.registry());
        state.apply_decoded(catalog, decoded);
        state.service.date = record.data.general.service_date.clone();
        state.selection = selection;
        state.step = 0;
        state
    }

    fn apply_decoded(&mut self, catalog: &Catalog, decoded: DecodedReport) {
        self.set_equipment_type(catalog, decoded.equipment_type.as_str());
        self.customer = decoded.customer;
        self.service = decoded.service;
        self.calibration = decoded.calibration;
        self.comments = decoded.comments;
        self.asset_info = decoded.asset_info;

        let matched = catalog
            .settings()
            .template_by_name(self.equipment_type.as_str(), &decoded.template_name);
        match matched {
            Some(template) => {
                self.template_data = rebuild_template_data(&template, decoded.template_data);
                self.selected_template = Some(template);
            }
            None => {
                self.template_data = decoded.template_data;
                self.selected_template = None;
            }
        }
    }
}
