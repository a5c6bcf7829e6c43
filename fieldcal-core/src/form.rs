//! The in-progress report and its transition rules.
//!
//! Type-dependent groups (`asset_info`, `calibration`, `template_data`) are
//! rebuilt whenever the equipment type or template changes. Customer, service
//! and comments survive both.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calibration::{Calibration, CalibrationDeltas};
use crate::catalog::Catalog;
use crate::code;
use crate::directory::{Asset, Customer, Site};
use crate::equipment::{EquipmentType, EquipmentTypeRegistry, DEFAULT_EQUIPMENT_TYPE};
use crate::error::ValidationError;
use crate::template::{ParamKind, ParamValue, Template};
use crate::types::{EquipmentTypeId, ParamId};
use crate::utils::{add_months, Delta};

pub const DEFAULT_SERVICE_TYPE: &str = "12 Weekly";
pub const DEFAULT_INTERVAL: &str = "3";

pub(crate) fn default_service_type() -> String {
    DEFAULT_SERVICE_TYPE.to_string()
}

pub(crate) fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}

/// Placeholder technician entry dropped by the legacy migration.
const NO_TECH: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerInfo {
    pub name: String,
    pub location: String,
    pub contact1: String,
    pub email1: String,
    pub phone1: String,
    pub contact2: String,
    pub email2: String,
    pub phone2: String,
}

/// Service details. Deserializes drafts written before the `techs` list, when
/// technicians were stored as `tech1`/`tech2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ServiceInfoCompat")]
pub struct ServiceInfo {
    pub asset: String,
    pub cv: String,
    #[serde(rename = "type")]
    pub service_type: String,
    /// Months until the next service.
    pub interval: String,
    /// `YYYY-MM-DD`, or empty.
    pub date: String,
    /// Technician identities, `"Name - phone - email"`.
    pub techs: Vec<String>,
    pub job_number: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            asset: String::new(),
            cv: String::new(),
            service_type: default_service_type(),
            interval: default_interval(),
            date: String::new(),
            techs: Vec::new(),
            job_number: String::new(),
        }
    }
}

impl ServiceInfo {
    /// Display names: the part of each identity before `" - "`.
    pub fn technician_names(&self) -> Vec<&str> {
        self.techs
            .iter()
            .map(|t| t.split(" - ").next().unwrap_or(t.as_str()))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInfoCompat {
    #[serde(default)]
    asset: String,
    #[serde(default)]
    cv: String,
    #[serde(rename = "type", default = "default_service_type")]
    service_type: String,
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    techs: Option<Vec<String>>,
    #[serde(default)]
    job_number: String,
    #[serde(default)]
    tech1: Option<String>,
    #[serde(default)]
    tech2: Option<String>,
}

impl From<ServiceInfoCompat> for ServiceInfo {
    fn from(c: ServiceInfoCompat) -> Self {
        let techs = match c.techs {
            Some(techs) => techs,
            None => [c.tech1, c.tech2]
                .into_iter()
                .flatten()
                .filter(|t| !t.is_empty() && t != NO_TECH)
                .collect(),
        };
        Self {
            asset: c.asset,
            cv: c.cv,
            service_type: c.service_type,
            interval: c.interval,
            date: c.date,
            techs,
            job_number: c.job_number,
        }
    }
}

/// Ids of the directory records the report is for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectorySelection {
    pub customer_id: String,
    pub site_id: String,
    pub asset_id: String,
}

impl DirectorySelection {
    pub fn is_complete(&self) -> bool {
        !self.customer_id.is_empty() && !self.site_id.is_empty() && !self.asset_id.is_empty()
    }
}

/// Values recomputed from the source fields on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFields {
    pub next_service_date: String,
    pub calibration: Option<CalibrationDeltas>,
    pub params: BTreeMap<ParamId, Delta>,
    pub report_code: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFormState {
    pub equipment_type: EquipmentTypeId,
    pub customer: CustomerInfo,
    pub service: ServiceInfo,
    /// Present only for types with a fixed calibration block.
    pub calibration: Option<Calibration>,
    pub asset_info: BTreeMap<String, String>,
    pub template_data: BTreeMap<ParamId, ParamValue>,
    pub comments: String,
    /// Snapshot of the selected template, not a live reference.
    pub selected_template: Option<Template>,
    pub selection: DirectorySelection,
    /// Current wizard page.
    pub step: usize,
}

impl ReportFormState {
    /// Empty report at the default equipment type with its first template.
    pub fn new(catalog: &Catalog) -> Self {
        let ty = catalog.resolve(DEFAULT_EQUIPMENT_TYPE);
        let mut state = Self {
            equipment_type: ty.id.clone(),
            customer: CustomerInfo::default(),
            service: ServiceInfo::default(),
            calibration: ty.default_cal(),
            asset_info: ty.default_ast.clone(),
            template_data: BTreeMap::new(),
            comments: String::new(),
            selected_template: None,
            selection: DirectorySelection::default(),
            step: 0,
        };
        state.select_template(catalog.settings().first_template_for(ty.id.as_str()));
        state
    }

    /// Discard everything, as for "New Report".
    pub fn reset(&mut self, catalog: &Catalog) {
        *self = Self::new(catalog);
    }

    pub fn equipment_type(&self, registry: &EquipmentTypeRegistry) -> EquipmentType {
        registry.resolve(self.equipment_type.as_str())
    }

    // --- derived ----------------------------------------------------------

    pub fn next_service_date(&self) -> String {
        add_months(&self.service.date, &self.service.interval)
    }

    pub fn calibration_deltas(&self) -> Option<CalibrationDeltas> {
        self.calibration.as_ref().map(Calibration::deltas)
    }

    pub fn report_code(&self, registry: &EquipmentTypeRegistry) -> String {
        code::generate(&self.service, self.equipment_type.as_str(), registry)
    }

    pub fn file_name(&self, registry: &EquipmentTypeRegistry) -> String {
        code::file_name(&self.report_code(registry))
    }

    pub fn derived(&self, registry: &EquipmentTypeRegistry) -> DerivedFields {
        let report_code = self.report_code(registry);
        DerivedFields {
            next_service_date: self.next_service_date(),
            calibration: self.calibration_deltas(),
            params: self
                .template_data
                .iter()
                .filter_map(|(id, v)| v.delta().map(|d| (id.clone(), d)))
                .collect(),
            file_name: code::file_name(&report_code),
            report_code,
        }
    }

    // --- transitions ------------------------------------------------------

    /// Switch equipment type. A no-op when `id` resolves to the current type.
    ///
    /// Asset info and calibration take the new type's defaults, template data
    /// is cleared, the wizard returns to the first step and the first
    /// template offered for the new type is selected.
    pub fn set_equipment_type(&mut self, catalog: &Catalog, id: &str) -> bool {
        let ty = catalog.resolve(id);
        if ty.id == self.equipment_type {
            return false;
        }
        self.apply_type(catalog, &ty);
        true
    }

    fn apply_type(&mut self, catalog: &Catalog, ty: &EquipmentType) {
        self.equipment_type = ty.id.clone();
        self.asset_info = ty.default_ast.clone();
        self.calibration = ty.default_cal();
        self.template_data.clear();
        self.step = 0;
        self.selected_template = catalog.settings().first_template_for(ty.id.as_str());
        if let Some(template) = &self.selected_template {
            self.template_data = rebuild_template_data(template, BTreeMap::new());
        }
    }

    /// Select a template snapshot and rebuild `template_data` against it.
    ///
    /// Entries whose id is kept and whose shape still matches are reused.
    /// Others are seeded empty, and ids the template lacks are dropped.
    /// `None` clears the selection but leaves the data alone.
    pub fn select_template(&mut self, template: Option<Template>) {
        if let Some(template) = &template {
            let previous = std::mem::take(&mut self.template_data);
            self.template_data = rebuild_template_data(template, previous);
        }
        self.selected_template = template;
    }

    /// Select a live template by id.
    pub fn select_template_by_id(&mut self, catalog: &Catalog, id: &str) -> Result<(), ValidationError> {
        let template = catalog
            .template(id)
            .cloned()
            .ok_or_else(|| ValidationError::TemplateNotFound(id.to_string()))?;
        self.select_template(Some(template));
        Ok(())
    }

    /// Seed customer and service fields from directory records.
    pub fn load_from_asset(&mut self, customer: Option<&Customer>, site: Option<&Site>, asset: Option<&Asset>) {
        if let Some(customer) = customer {
            self.customer.name = customer.name.clone();
            self.customer.location = site.map(|s| s.display_location().to_string()).unwrap_or_default();
            self.selection.customer_id = customer.id.clone();
        }
        if let Some(site) = site {
            self.selection.site_id = site.id.clone();
            let contact = site.contacts.first().cloned().unwrap_or_default();
            let contact2 = site.contacts.get(1).cloned().unwrap_or_default();
            if !site.contacts.is_empty() {
                self.customer.contact1 = contact.name;
                self.customer.email1 = contact.email;
                self.customer.phone1 = contact.phone;
                self.customer.contact2 = contact2.name;
                self.customer.email2 = contact2.email;
                self.customer.phone2 = contact2.phone;
            }
        }
        if let Some(asset) = asset {
            self.service.asset = asset.name.clone();
            self.service.cv = asset.code.clone();
            self.selection.asset_id = asset.id.clone();
        }
    }

    // --- field edits ------------------------------------------------------

    pub fn set_asset_field(
        &mut self,
        registry: &EquipmentTypeRegistry,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let ty = self.equipment_type(registry);
        if ty.asset_field(key).is_none() {
            return Err(ValidationError::UnknownAssetField {
                key: key.to_string(),
                equipment_type: ty.id.to_string(),
            });
        }
        self.asset_info.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn set_calibration(&mut self, key: &str, value: impl Into<String>) -> Result<(), ValidationError> {
        let cal = self
            .calibration
            .as_mut()
            .ok_or_else(|| ValidationError::NoFixedCalibration(self.equipment_type.to_string()))?;
        cal.set(key, value)
    }

    /// Replace one parameter value. The id must belong to the selected
    /// template and the shape must match the parameter type.
    pub fn set_param_value(&mut self, id: &str, value: ParamValue) -> Result<(), ValidationError> {
        let kind = self.param_kind(id)?;
        if value.kind() != kind {
            return Err(ValidationError::ParamShape(id.to_string(), kind_name(kind)));
        }
        self.template_data.insert(ParamId::from(id), value);
        Ok(())
    }

    pub fn set_param_as_found(&mut self, id: &str, value: &str) -> Result<(), ValidationError> {
        self.edit_cal_param(id, |af, _, _| *af = value.to_string())
    }

    pub fn set_param_as_left(&mut self, id: &str, value: &str) -> Result<(), ValidationError> {
        self.edit_cal_param(id, |_, al, _| *al = value.to_string())
    }

    /// Toggle whether a pair's percentage change is shown.
    pub fn toggle_param_pct(&mut self, id: &str) -> Result<(), ValidationError> {
        self.edit_cal_param(id, |_, _, inc| *inc = !*inc)
    }

    fn edit_cal_param(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut String, &mut String, &mut bool),
    ) -> Result<(), ValidationError> {
        if self.param_kind(id)? != ParamKind::Cal {
            return Err(ValidationError::ParamShape(id.to_string(), kind_name(ParamKind::Val)));
        }
        let entry = self
            .template_data
            .entry(ParamId::from(id))
            .or_insert_with(|| ParamValue::seed(ParamKind::Cal));
        if let ParamValue::Cal { af, al, inc_pct } = entry {
            f(af, al, inc_pct);
        }
        Ok(())
    }

    fn param_kind(&self, id: &str) -> Result<ParamKind, ValidationError> {
        self.selected_template
            .as_ref()
            .and_then(|t| t.param(id))
            .map(|p| p.kind)
            .ok_or_else(|| ValidationError::UnknownParam(id.to_string()))
    }

    // --- wizard -----------------------------------------------------------

    /// Move to the next step. Leaving the first step requires a complete
    /// directory selection and a service date.
    pub fn advance_step(&mut self, registry: &EquipmentTypeRegistry) -> Result<usize, ValidationError> {
        if self.step == 0 {
            self.check_general()?;
        }
        let last = self.step_count(registry).saturating_sub(1);
        self.step = (self.step + 1).min(last);
        Ok(self.step)
    }

    pub fn back_step(&mut self) -> usize {
        self.step = self.step.saturating_sub(1);
        self.step
    }

    pub fn goto_step(&mut self, registry: &EquipmentTypeRegistry, step: usize) -> Result<(), ValidationError> {
        let count = self.step_count(registry);
        if step >= count {
            return Err(ValidationError::StepOutOfRange { step, count });
        }
        self.step = step;
        Ok(())
    }

    pub fn step_count(&self, registry: &EquipmentTypeRegistry) -> usize {
        self.equipment_type(registry).steps.len()
    }

    pub fn can_finalize(&self) -> bool {
        self.check_general().is_ok()
    }

    fn check_general(&self) -> Result<(), ValidationError> {
        if self.selection.customer_id.is_empty() {
            return Err(ValidationError::StepRequirement("Select a customer to continue"));
        }
        if self.selection.site_id.is_empty() {
            return Err(ValidationError::StepRequirement("Select a site to continue"));
        }
        if self.selection.asset_id.is_empty() {
            return Err(ValidationError::StepRequirement("Select an asset to continue"));
        }
        if self.service.date.trim().is_empty() {
            return Err(ValidationError::StepRequirement("Enter a service date to continue"));
        }
        Ok(())
    }

    /// Drop asset-info keys outside the active schema and fill missing ones
    /// with the type defaults.
    pub(crate) fn normalize_asset_info(&mut self, ty: &EquipmentType) {
        let mut ast = ty.default_ast.clone();
        for (key, value) in ast.iter_mut() {
            if let Some(v) = self.asset_info.remove(key) {
                *value = v;
            }
        }
        self.asset_info = ast;
    }
}

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Cal => "calibration pair",
        ParamKind::Val => "single value",
    }
}

pub(crate) fn rebuild_template_data(
    template: &Template,
    mut previous: BTreeMap<ParamId, ParamValue>,
) -> BTreeMap<ParamId, ParamValue> {
    template
        .params
        .iter()
        .map(|p| {
            let value = match previous.remove(&p.id) {
                Some(v) if v.kind() == p.kind => v,
                _ => ParamValue::seed(p.kind),
            };
            (p.id.clone(), value)
        })
        .collect()
}
