//! Draft rows: persisted snapshots of an in-progress report.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::catalog::Catalog;
use crate::equipment::DEFAULT_EQUIPMENT_TYPE;
use crate::form::{rebuild_template_data, CustomerInfo, DirectorySelection, ReportFormState, ServiceInfo};
use crate::template::{ParamValue, Template};
use crate::types::{DraftId, EquipmentTypeId, ParamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    #[default]
    Draft,
    Completed,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftStatus::Draft => write!(f, "draft"),
            DraftStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A draft row. Form groups keep their short historical keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Assigned by the repository on first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DraftId>,
    #[serde(default)]
    pub status: DraftStatus,
    #[serde(default)]
    pub created_by: String,
    #[serde(default = "default_draft_type")]
    pub equipment_type: EquipmentTypeId,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub asset_name: String,
    #[serde(default)]
    pub cust: CustomerInfo,
    #[serde(default)]
    pub svc: ServiceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cal: Option<Calibration>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub ast: BTreeMap<String, String>,
    #[serde(rename = "intD", default)]
    pub int_d: BTreeMap<ParamId, ParamValue>,
    #[serde(default)]
    pub sel_tpl: Option<Template>,
    #[serde(default)]
    pub step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_draft_type() -> EquipmentTypeId {
    EquipmentTypeId::from(DEFAULT_EQUIPMENT_TYPE)
}

impl Draft {
    /// Snapshot `state`. The id and timestamps are left for the repository.
    pub fn from_state(state: &ReportFormState, created_by: &str, status: DraftStatus) -> Self {
        Self {
            id: None,
            status,
            created_by: created_by.to_string(),
            equipment_type: state.equipment_type.clone(),
            customer_id: state.selection.customer_id.clone(),
            customer_name: state.customer.name.clone(),
            site_id: state.selection.site_id.clone(),
            site_name: state.customer.location.clone(),
            asset_id: state.selection.asset_id.clone(),
            asset_name: state.service.asset.clone(),
            cust: state.customer.clone(),
            svc: state.service.clone(),
            cal: state.calibration.clone(),
            comments: state.comments.clone(),
            ast: state.asset_info.clone(),
            int_d: state.template_data.clone(),
            sel_tpl: state.selected_template.clone(),
            step: state.step,
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether the draft shows up in "resume draft" listings.
    pub fn is_resumable(&self) -> bool {
        self.status == DraftStatus::Draft
    }

    /// Rebuild the form. Groups are restored as stored; the selected template
    /// is the live one with the same id when it still exists.
    pub fn to_state(&self, catalog: &Catalog) -> ReportFormState {
        let ty = catalog.resolve(self.equipment_type.as_str());
        let selected_template = self
            .sel_tpl
            .as_ref()
            .map(|snap| catalog.template(snap.id.as_str()).cloned().unwrap_or_else(|| snap.clone()));

        let template_data = match &selected_template {
            Some(t) => rebuild_template_data(t, self.int_d.clone()),
            None => self.int_d.clone(),
        };

        let mut state = ReportFormState {
            equipment_type: ty.id.clone(),
            customer: self.cust.clone(),
            service: self.svc.clone(),
            calibration: ty
                .has_fixed_cal
                .then(|| self.cal.clone().unwrap_or_default()),
            asset_info: self.ast.clone(),
            template_data,
            comments: self.comments.clone(),
            selected_template,
            selection: DirectorySelection {
                customer_id: self.customer_id.clone(),
                site_id: self.site_id.clone(),
                asset_id: self.asset_id.clone(),
            },
            step: self.step.min(ty.steps.len().saturating_sub(1)),
        };
        state.normalize_asset_info(&ty);
        state
    }
}
