//! fieldcal core library: equipment types, templates, the report form and
//! its two serialized shapes (draft row and archival record).
//!
//! - [`equipment`] built-in and custom equipment types, the registry
//! - [`template`] parameter templates and value shapes
//! - [`settings`] the reporting settings bundle
//! - [`form`] in-progress report state and transition rules
//! - [`code`] report code / file name
//! - [`archive`] archival record encode/decode
//! - [`draft`] draft rows
//! - [`utils`] delta and date helpers

pub mod archive;
pub mod calibration;
pub mod catalog;
pub mod code;
pub mod directory;
pub mod draft;
pub mod equipment;
pub mod error;
pub mod form;
pub mod settings;
pub mod template;
pub mod types;
pub mod utils;

pub use archive::{decode, encode, ArchivalRecord, DecodedReport, IntegratorEntry};
pub use calibration::{Calibration, CalibrationDeltas};
pub use catalog::Catalog;
pub use directory::{Asset, Contact, Customer, ReportEntry, Site};
pub use draft::{Draft, DraftStatus};
pub use equipment::{
    AssetField, AssetFieldType, EquipmentType, EquipmentTypeDraft, EquipmentTypeRegistry, Step,
};
pub use error::{CoreError, ValidationError};
pub use form::{CustomerInfo, DerivedFields, DirectorySelection, ReportFormState, ServiceInfo};
pub use settings::{CommentEntry, ReportingSettings, SettingsSeed};
pub use template::{ParamKind, ParamValue, Template, TemplateParam};
pub use types::{DraftId, EquipmentTypeId, ParamId, Role, TemplateId};
pub use utils::{add_months, diff, format_long_date, Delta, NO_DATA};
