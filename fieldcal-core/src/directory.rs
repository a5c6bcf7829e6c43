//! Customer/site/asset directory records.
//!
//! Read-only from the form's point of view. The only write path is appending
//! or removing archival records on an asset.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::archive::ArchivalRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// A site and the serviceable assets on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub service_data: Vec<Asset>,
    /// Site data this crate does not model (roller and spec sheets and the
    /// like), written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Site {
    /// Location shown on reports, falling back to the site name.
    pub fn display_location(&self) -> &str {
        if self.location.is_empty() {
            &self.name
        } else {
            &self.location
        }
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.service_data.iter().find(|a| a.id == id)
    }

    pub fn asset_mut(&mut self, id: &str) -> Option<&mut Asset> {
        self.service_data.iter_mut().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Conveyor code, copied into the service info.
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub reports: Vec<ReportEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    /// Entries that decode as archival records.
    pub fn records(&self) -> impl Iterator<Item = &ArchivalRecord> {
        self.reports.iter().filter_map(ReportEntry::record)
    }

    /// Most recent archival record by finalization time.
    pub fn latest_report(&self) -> Option<&ArchivalRecord> {
        self.records().max_by_key(|r| r.date)
    }

    pub fn report(&self, id: i64) -> Option<&ArchivalRecord> {
        self.records().find(|r| r.id == id)
    }
}

/// One entry of an asset's report history.
///
/// Rows that are not archival records (hand-entered history, records missing
/// their `data`) are kept as raw JSON so the site stays readable and the rows
/// survive a write-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Record(ArchivalRecord),
    Other(Value),
}

impl ReportEntry {
    pub fn record(&self) -> Option<&ArchivalRecord> {
        match self {
            Self::Record(r) => Some(r),
            Self::Other(_) => None,
        }
    }
}

impl From<ArchivalRecord> for ReportEntry {
    fn from(record: ArchivalRecord) -> Self {
        Self::Record(record)
    }
}
