//! Equipment types and the registry that resolves them.
//!
//! Built-in types are constant. Custom types come from the persisted settings
//! bundle and are swapped in wholesale by
//! [`EquipmentTypeRegistry::register_custom_types`]. Lookups never fail: an
//! unknown or empty id resolves to [`DEFAULT_EQUIPMENT_TYPE`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::error::ValidationError;
use crate::types::{short_uid, EquipmentTypeId};

pub const DEFAULT_EQUIPMENT_TYPE: &str = "belt_weigher";
pub const BELT_WEIGHER: &str = "belt_weigher";
pub const TMD: &str = "tmd";

/// Default value of a `condition` asset field.
pub const CONDITION_DEFAULT: &str = "Good";

/// Limit on `short_label` and `report_code_prefix`.
pub const SHORT_CODE_MAX: usize = 4;

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// One wizard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub key: String,
    pub label: String,
}

impl Step {
    fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetFieldType {
    #[default]
    Text,
    Dropdown,
    Condition,
}

impl fmt::Display for AssetFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetFieldType::Text => write!(f, "text"),
            AssetFieldType::Dropdown => write!(f, "dropdown"),
            AssetFieldType::Condition => write!(f, "condition"),
        }
    }
}

/// Descriptor of one asset-info field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetField {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: AssetFieldType,
    /// Name of a list in the settings dropdown registry. Required for
    /// dropdown fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropdown_key: Option<String>,
}

impl AssetField {
    pub fn new(key: &str, label: &str, field_type: AssetFieldType, dropdown_key: Option<&str>) -> Self {
        Self {
            id: key.to_string(),
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            dropdown_key: dropdown_key.map(str::to_string),
        }
    }

    /// Default value derived from the field type.
    pub fn default_value(&self) -> &'static str {
        match self.field_type {
            AssetFieldType::Condition => CONDITION_DEFAULT,
            _ => "",
        }
    }
}

/// A class of serviceable equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentType {
    pub id: EquipmentTypeId,
    pub label: String,
    #[serde(default)]
    pub short_label: String,
    #[serde(default)]
    pub report_code_prefix: String,
    #[serde(default)]
    pub pdf_title: String,
    #[serde(default)]
    pub is_built_in: bool,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub asset_fields: Vec<AssetField>,
    #[serde(default)]
    pub default_ast: BTreeMap<String, String>,
    #[serde(default)]
    pub has_fixed_cal: bool,
}

impl EquipmentType {
    /// Fresh fixed-calibration block, `None` for types without one.
    pub fn default_cal(&self) -> Option<Calibration> {
        self.has_fixed_cal.then(Calibration::default)
    }

    pub fn asset_field(&self, key: &str) -> Option<&AssetField> {
        self.asset_fields.iter().find(|f| f.key == key)
    }

    pub fn has_step(&self, key: &str) -> bool {
        self.steps.iter().any(|s| s.key == key)
    }

    /// Bring `default_ast` in line with `asset_fields`: keys are exactly the
    /// field keys, existing values are kept, missing ones are derived.
    pub fn normalize_default_ast(&mut self) {
        let previous = std::mem::take(&mut self.default_ast);
        self.default_ast = self
            .asset_fields
            .iter()
            .map(|f| {
                let value = previous
                    .get(&f.key)
                    .cloned()
                    .unwrap_or_else(|| f.default_value().to_string());
                (f.key.clone(), value)
            })
            .collect();
    }
}

/// `defaultAst` derived purely from field types.
pub fn derive_default_ast(fields: &[AssetField]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|f| (f.key.clone(), f.default_value().to_string()))
        .collect()
}

/// `"Load Cell Capacity"` → `"load_cell_capacity"`.
pub fn field_key_from_label(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_sep = false;
    for c in label.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(c);
        } else {
            pending_sep = true;
        }
    }
    key
}

// ---------------------------------------------------------------------------
// Custom type authoring
// ---------------------------------------------------------------------------

/// Steps a custom type may enable, in canonical order. `general` is mandatory.
pub const CUSTOM_STEPS: [(&str, &str); 4] = [
    ("general", "General"),
    ("templateData", "Data"),
    ("comments", "Comments"),
    ("assetInfo", "Asset Info"),
];

/// Editor input for creating or updating a custom equipment type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentTypeDraft {
    pub label: String,
    pub short_label: String,
    pub report_code_prefix: String,
    #[serde(default)]
    pub pdf_title: String,
    #[serde(default)]
    pub asset_fields: Vec<AssetField>,
    /// Enabled step keys. Unknown keys are ignored; `general` is always added.
    #[serde(default)]
    pub steps: Vec<String>,
}

impl EquipmentTypeDraft {
    /// Validate and build a custom type with the given id.
    pub fn build(self, id: EquipmentTypeId) -> Result<EquipmentType, ValidationError> {
        let label = required(&self.label, "label")?;
        let short_label = short_code(&self.short_label, "short label")?;
        let prefix = short_code(&self.report_code_prefix, "report code prefix")?;

        let mut seen = HashSet::new();
        let mut asset_fields = Vec::with_capacity(self.asset_fields.len());
        for mut field in self.asset_fields {
            field.key = field.key.trim().to_string();
            if field.key.is_empty() {
                field.key = field_key_from_label(&field.label);
            }
            if field.key.is_empty() {
                return Err(ValidationError::EmptyAssetFieldKey { label: field.label });
            }
            if !seen.insert(field.key.clone()) {
                return Err(ValidationError::DuplicateAssetFieldKey(field.key));
            }
            match field.field_type {
                AssetFieldType::Dropdown => {
                    if field.dropdown_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                        return Err(ValidationError::MissingDropdownKey(field.key));
                    }
                }
                _ => field.dropdown_key = None,
            }
            if field.id.is_empty() {
                field.id = short_uid();
            }
            asset_fields.push(field);
        }

        let steps = CUSTOM_STEPS
            .iter()
            .filter(|(key, _)| *key == "general" || self.steps.iter().any(|s| s == key))
            .map(|(key, label)| Step::new(key, label))
            .collect();

        let pdf_title = match self.pdf_title.trim() {
            "" => format!("{label} Report"),
            title => title.to_string(),
        };

        let default_ast = derive_default_ast(&asset_fields);
        Ok(EquipmentType {
            id,
            label,
            short_label,
            report_code_prefix: prefix,
            pdf_title,
            is_built_in: false,
            steps,
            asset_fields,
            default_ast,
            has_fixed_cal: false,
        })
    }
}

/// Fresh id for a new custom type.
pub fn new_custom_type_id() -> EquipmentTypeId {
    EquipmentTypeId(format!("eq_{}", short_uid()))
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    match value.trim() {
        "" => Err(ValidationError::Required(field)),
        v => Ok(v.to_string()),
    }
}

fn short_code(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let v = required(value, field)?.to_uppercase();
    let len = v.chars().count();
    if len > SHORT_CODE_MAX {
        return Err(ValidationError::TooLong {
            field,
            max: SHORT_CODE_MAX,
            len,
        });
    }
    Ok(v)
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// The two built-in types, in listing order.
pub fn built_in_types() -> Vec<EquipmentType> {
    use AssetFieldType::{Condition, Dropdown, Text};

    let bw_fields = vec![
        AssetField::new("scaleType", "Scale Type", Dropdown, Some("scaleTypes")),
        AssetField::new("speedIn", "Speed Input", Dropdown, Some("speedInputs")),
        AssetField::new("scaleCond", "Scale Condition", Condition, None),
        AssetField::new("billetType", "Billet Weight Type", Dropdown, Some("billetWeightTypes")),
        AssetField::new("integrator", "Integrator", Dropdown, Some("integratorTypes")),
        AssetField::new("nw", "Number of Weigh Idlers", Text, None),
        AssetField::new("nlc", "Number of Load Cells", Text, None),
        AssetField::new("bs", "Billet Size", Text, None),
        AssetField::new("lcCap", "Load Cell Capacity", Text, None),
        AssetField::new("billetCond", "Billet Condition", Condition, None),
        AssetField::new("lcSpecs", "Load Cell Specs", Text, None),
        AssetField::new("nmi", "NMI Approved", Text, None),
        AssetField::new("nmiCls", "NMI Class", Text, None),
        AssetField::new("rCond", "Roller Condition", Condition, None),
        AssetField::new("rType", "Roller Type", Dropdown, Some("rollerTypes")),
        AssetField::new("rDate", "Roller Change Date", Text, None),
        AssetField::new("rSize", "Roller Size", Text, None),
    ];
    let mut bw_ast = derive_default_ast(&bw_fields);
    bw_ast.insert("nmi".into(), "No".into());
    bw_ast.insert("nmiCls".into(), "N/A".into());

    let tmd_fields = vec![
        AssetField::new("frameType", "Frame Type", Dropdown, Some("tmdFrameTypes")),
        AssetField::new("frameCond", "Frame Condition", Condition, None),
        AssetField::new("speedInput", "Speed Input", Dropdown, Some("tmdSpeedInputs")),
        AssetField::new("controller", "Controller", Dropdown, Some("tmdControllers")),
    ];
    let tmd_ast = derive_default_ast(&tmd_fields);

    vec![
        EquipmentType {
            id: EquipmentTypeId::from(BELT_WEIGHER),
            label: "Belt Weigher".into(),
            short_label: "BW".into(),
            report_code_prefix: "CALR".into(),
            pdf_title: "Belt Weigher Report".into(),
            is_built_in: true,
            steps: vec![
                Step::new("general", "General"),
                Step::new("calibration", "Calibration"),
                Step::new("comments", "Comments"),
                Step::new("assetInfo", "Asset Info"),
                Step::new("intData", "Integrator Data"),
            ],
            asset_fields: bw_fields,
            default_ast: bw_ast,
            has_fixed_cal: true,
        },
        EquipmentType {
            id: EquipmentTypeId::from(TMD),
            label: "Tramp Metal Detector".into(),
            short_label: "TMD".into(),
            report_code_prefix: "TMDR".into(),
            pdf_title: "Tramp Metal Detector Report".into(),
            is_built_in: true,
            steps: vec![
                Step::new("general", "General"),
                Step::new("tmdData", "TMD Data"),
                Step::new("comments", "Comments"),
                Step::new("assetInfo", "Asset Info"),
            ],
            asset_fields: tmd_fields,
            default_ast: tmd_ast,
            has_fixed_cal: false,
        },
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Built-in plus runtime-registered custom equipment types.
///
/// The custom set lives behind an `Arc` that is swapped under a write lock,
/// so a reader sees either the whole old set or the whole new one.
#[derive(Debug)]
pub struct EquipmentTypeRegistry {
    built_ins: Vec<EquipmentType>,
    custom: RwLock<Arc<Vec<EquipmentType>>>,
}

impl Default for EquipmentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EquipmentTypeRegistry {
    fn clone(&self) -> Self {
        Self {
            built_ins: self.built_ins.clone(),
            custom: RwLock::new(self.custom_snapshot()),
        }
    }
}

impl EquipmentTypeRegistry {
    /// Registry holding only the built-ins. Custom types must be registered
    /// explicitly before they resolve.
    pub fn new() -> Self {
        Self {
            built_ins: built_in_types(),
            custom: RwLock::new(Arc::new(Vec::new())),
        }
    }

    fn custom_snapshot(&self) -> Arc<Vec<EquipmentType>> {
        match self.custom.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Resolve `id` to a full type; unknown or empty ids fall back to the
    /// default built-in.
    pub fn resolve(&self, id: &str) -> EquipmentType {
        self.lookup(id).unwrap_or_else(|| self.default_type())
    }

    /// Exact lookup without the fallback.
    pub fn lookup(&self, id: &str) -> Option<EquipmentType> {
        let custom = self.custom_snapshot();
        custom
            .iter()
            .chain(self.built_ins.iter())
            .find(|t| t.id.as_str() == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    pub fn default_type(&self) -> EquipmentType {
        self.built_ins
            .iter()
            .find(|t| t.id.as_str() == DEFAULT_EQUIPMENT_TYPE)
            .or_else(|| self.built_ins.first())
            .cloned()
            .unwrap_or_else(|| built_in_types().remove(0))
    }

    /// Replace the whole custom set.
    ///
    /// Entries are normalized (custom flags forced, `default_ast` derived
    /// from the asset fields). Entries whose id collides with a built-in or
    /// an earlier entry are skipped; their ids are returned.
    pub fn register_custom_types(&self, types: Vec<EquipmentType>) -> Vec<EquipmentTypeId> {
        let mut rejected = Vec::new();
        let mut seen: HashSet<EquipmentTypeId> =
            self.built_ins.iter().map(|t| t.id.clone()).collect();
        let mut custom = Vec::with_capacity(types.len());
        for mut t in types {
            if !seen.insert(t.id.clone()) {
                rejected.push(t.id);
                continue;
            }
            t.is_built_in = false;
            t.has_fixed_cal = false;
            t.normalize_default_ast();
            custom.push(t);
        }

        let next = Arc::new(custom);
        match self.custom.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        rejected
    }

    /// Built-ins followed by customs, in registration order.
    pub fn list_all(&self) -> Vec<EquipmentType> {
        let custom = self.custom_snapshot();
        self.built_ins
            .iter()
            .chain(custom.iter())
            .cloned()
            .collect()
    }

    pub fn custom_types(&self) -> Vec<EquipmentType> {
        self.custom_snapshot().as_ref().clone()
    }
}
