//! Error types for fieldcal-core.

use std::path::PathBuf;

use thiserror::Error;

/// A rejected edit. Surfaced synchronously to the caller and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required text field was empty after trimming.
    #[error("{0} is required")]
    Required(&'static str),

    /// A short code (badge label, report prefix) exceeded its length limit.
    #[error("{field} must be at most {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("duplicate parameter id '{param}' in template '{template}'")]
    DuplicateParamId { template: String, param: String },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Built-in templates ship with the catalog and cannot be removed.
    #[error("template '{0}' is a default template and cannot be deleted")]
    DefaultTemplate(String),

    #[error("category already exists: {0}")]
    DuplicateCategory(String),

    #[error("comment not found: {0}")]
    CommentNotFound(String),

    #[error("unknown dropdown list: {0}")]
    UnknownDropdown(String),

    #[error("dropdown '{key}' has no item at index {index}")]
    DropdownIndex { key: String, index: usize },

    #[error("unit already exists: {0:?}")]
    DuplicateUnit(String),

    #[error("asset field key is empty (field '{label}')")]
    EmptyAssetFieldKey { label: String },

    #[error("duplicate asset field key '{0}'")]
    DuplicateAssetFieldKey(String),

    #[error("dropdown field '{0}' needs a dropdown list")]
    MissingDropdownKey(String),

    #[error("equipment type '{0}' is built in and cannot be changed")]
    BuiltInEquipmentType(String),

    #[error("equipment type not found: {0}")]
    EquipmentTypeNotFound(String),

    #[error("'{key}' is not an asset field of equipment type '{equipment_type}'")]
    UnknownAssetField { key: String, equipment_type: String },

    #[error("'{0}' is not a parameter of the selected template")]
    UnknownParam(String),

    #[error("parameter '{0}' expects a {1} value")]
    ParamShape(String, &'static str),

    #[error("unknown calibration field '{0}'")]
    UnknownCalibrationField(String),

    #[error("equipment type '{0}' has no fixed calibration block")]
    NoFixedCalibration(String),

    /// Wizard navigation guard; the message is shown to the user as-is.
    #[error("{0}")]
    StepRequirement(&'static str),

    #[error("step {step} is out of range (type has {count} steps)")]
    StepOutOfRange { step: usize, count: usize },
}

/// Errors from loading seed or settings documents.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on a seed file, with the file path.
    #[error("failed to parse seed file at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
