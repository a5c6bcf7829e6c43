//! The reporting settings bundle: dropdown lists, comment library, templates,
//! units, condition colours and custom equipment types.
//!
//! Persisted as one document. Fields missing from a stored document take the
//! built-in defaults, so an older bundle loads with every newer list filled.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::equipment::{
    new_custom_type_id, EquipmentType, EquipmentTypeDraft, EquipmentTypeRegistry,
};
use crate::error::{CoreError, ValidationError};
use crate::template::{built_in_templates, new_template_id, templates_for, Template};
use crate::types::{short_uid, EquipmentTypeId, TemplateId};

/// One reusable comment snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub id: String,
    pub cat: String,
    pub text: String,
    /// Whether the snippet is offered in the comment picker.
    #[serde(default = "enabled")]
    pub on: bool,
}

fn enabled() -> bool {
    true
}

/// Partial comment update; `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommentPatch {
    pub cat: Option<String>,
    pub text: Option<String>,
    pub on: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportingSettings {
    pub dropdown_options: BTreeMap<String, Vec<String>>,
    pub comment_library: Vec<CommentEntry>,
    pub templates: Vec<Template>,
    pub units: Vec<String>,
    pub categories: Vec<String>,
    pub condition_colors: BTreeMap<String, String>,
    pub custom_equipment_types: Vec<EquipmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            dropdown_options: default_dropdowns(),
            comment_library: default_comments(),
            templates: built_in_templates(),
            units: DEFAULT_UNITS.iter().map(|u| u.to_string()).collect(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            condition_colors: BTreeMap::new(),
            custom_equipment_types: Vec::new(),
            updated_at: None,
        }
    }
}

impl ReportingSettings {
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    pub fn dropdown(&self, key: &str) -> &[String] {
        self.dropdown_options
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // --- categories -------------------------------------------------------

    pub fn add_category(&mut self, name: &str) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required("category name"));
        }
        if self.categories.iter().any(|c| c == name) {
            return Err(ValidationError::DuplicateCategory(name.to_string()));
        }
        self.categories.push(name.to_string());
        Ok(())
    }

    /// Remove a category together with its comments.
    pub fn remove_category(&mut self, name: &str) {
        self.categories.retain(|c| c != name);
        self.comment_library.retain(|c| c.cat != name);
    }

    pub fn rename_category(&mut self, old: &str, new: &str) -> Result<(), ValidationError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(ValidationError::Required("category name"));
        }
        if new != old && self.categories.iter().any(|c| c == new) {
            return Err(ValidationError::DuplicateCategory(new.to_string()));
        }
        for c in self.categories.iter_mut().filter(|c| *c == old) {
            *c = new.to_string();
        }
        for c in self.comment_library.iter_mut().filter(|c| c.cat == old) {
            c.cat = new.to_string();
        }
        Ok(())
    }

    // --- comments ---------------------------------------------------------

    /// Add a comment, registering its category if new. Returns the new id.
    pub fn add_comment(&mut self, cat: &str, text: &str) -> Result<String, ValidationError> {
        if cat.trim().is_empty() {
            return Err(ValidationError::Required("comment category"));
        }
        if text.trim().is_empty() {
            return Err(ValidationError::Required("comment text"));
        }
        if !self.categories.iter().any(|c| c == cat) {
            self.categories.push(cat.to_string());
        }
        let id = short_uid();
        self.comment_library.push(CommentEntry {
            id: id.clone(),
            cat: cat.to_string(),
            text: text.to_string(),
            on: true,
        });
        Ok(id)
    }

    pub fn update_comment(&mut self, id: &str, patch: CommentPatch) -> Result<(), ValidationError> {
        let entry = self.comment_mut(id)?;
        if let Some(cat) = patch.cat {
            entry.cat = cat;
        }
        if let Some(text) = patch.text {
            entry.text = text;
        }
        if let Some(on) = patch.on {
            entry.on = on;
        }
        Ok(())
    }

    pub fn delete_comment(&mut self, id: &str) -> Result<(), ValidationError> {
        let before = self.comment_library.len();
        self.comment_library.retain(|c| c.id != id);
        if self.comment_library.len() == before {
            return Err(ValidationError::CommentNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Flip a comment's enabled flag, returning the new value.
    pub fn toggle_comment(&mut self, id: &str) -> Result<bool, ValidationError> {
        let entry = self.comment_mut(id)?;
        entry.on = !entry.on;
        Ok(entry.on)
    }

    fn comment_mut(&mut self, id: &str) -> Result<&mut CommentEntry, ValidationError> {
        self.comment_library
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ValidationError::CommentNotFound(id.to_string()))
    }

    // --- dropdowns --------------------------------------------------------

    /// Append an item to a dropdown list, creating the list if needed.
    pub fn add_dropdown_item(&mut self, key: &str, item: &str) -> Result<(), ValidationError> {
        let item = item.trim();
        if item.is_empty() {
            return Err(ValidationError::Required("dropdown item"));
        }
        self.dropdown_options
            .entry(key.to_string())
            .or_default()
            .push(item.to_string());
        Ok(())
    }

    pub fn remove_dropdown_item(&mut self, key: &str, index: usize) -> Result<String, ValidationError> {
        let list = self
            .dropdown_options
            .get_mut(key)
            .ok_or_else(|| ValidationError::UnknownDropdown(key.to_string()))?;
        if index >= list.len() {
            return Err(ValidationError::DropdownIndex {
                key: key.to_string(),
                index,
            });
        }
        Ok(list.remove(index))
    }

    // --- units ------------------------------------------------------------

    pub fn add_unit(&mut self, unit: &str) -> Result<(), ValidationError> {
        let unit = unit.trim();
        if unit.is_empty() {
            return Err(ValidationError::Required("unit"));
        }
        if self.units.iter().any(|u| u == unit) {
            return Err(ValidationError::DuplicateUnit(unit.to_string()));
        }
        self.units.push(unit.to_string());
        Ok(())
    }

    pub fn remove_unit(&mut self, unit: &str) {
        self.units.retain(|u| u != unit);
    }

    // --- condition colours ------------------------------------------------

    /// Set or clear (`None` or empty) the colour shown for a condition value.
    pub fn set_condition_color(&mut self, condition: &str, color: Option<&str>) {
        match color.filter(|c| !c.is_empty()) {
            Some(color) => {
                self.condition_colors
                    .insert(condition.to_string(), color.to_string());
            }
            None => {
                self.condition_colors.remove(condition);
            }
        }
    }

    // --- templates --------------------------------------------------------

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id.as_str() == id)
    }

    pub fn templates_for<'a>(&'a self, equipment_type: &'a str) -> impl Iterator<Item = &'a Template> + 'a {
        templates_for(&self.templates, equipment_type)
    }

    /// First template offered for a type.
    pub fn first_template_for(&self, equipment_type: &str) -> Option<Template> {
        templates_for(&self.templates, equipment_type).next().cloned()
    }

    /// Best-effort match on template name within a type.
    pub fn template_by_name(&self, equipment_type: &str, name: &str) -> Option<Template> {
        if name.is_empty() {
            return None;
        }
        templates_for(&self.templates, equipment_type)
            .find(|t| t.name == name)
            .cloned()
    }

    /// Store a new user template under a fresh id.
    pub fn add_template(&mut self, mut template: Template) -> Result<TemplateId, ValidationError> {
        template.id = new_template_id();
        template.is_default = false;
        template.validate()?;
        let id = template.id.clone();
        self.templates.push(template);
        Ok(id)
    }

    /// Replace a template's contents. The id and default flag are kept.
    pub fn update_template(&mut self, id: &str, mut template: Template) -> Result<(), ValidationError> {
        let slot = self
            .templates
            .iter_mut()
            .find(|t| t.id.as_str() == id)
            .ok_or_else(|| ValidationError::TemplateNotFound(id.to_string()))?;
        template.id = slot.id.clone();
        template.is_default = slot.is_default;
        template.validate()?;
        *slot = template;
        Ok(())
    }

    /// Delete a user template. Default templates are rejected.
    pub fn delete_template(&mut self, id: &str) -> Result<Template, ValidationError> {
        let idx = self
            .templates
            .iter()
            .position(|t| t.id.as_str() == id)
            .ok_or_else(|| ValidationError::TemplateNotFound(id.to_string()))?;
        if self.templates[idx].is_default {
            return Err(ValidationError::DefaultTemplate(id.to_string()));
        }
        Ok(self.templates.remove(idx))
    }

    pub fn duplicate_template(&mut self, id: &str) -> Result<TemplateId, ValidationError> {
        let copy = self
            .template(id)
            .ok_or_else(|| ValidationError::TemplateNotFound(id.to_string()))?
            .duplicate();
        let new_id = copy.id.clone();
        self.templates.push(copy);
        Ok(new_id)
    }

    // --- custom equipment types ------------------------------------------

    /// Validate and add a custom equipment type. Callers holding a registry
    /// must re-register afterwards (see [`crate::Catalog`]).
    pub fn add_custom_equipment_type(
        &mut self,
        draft: EquipmentTypeDraft,
    ) -> Result<EquipmentTypeId, ValidationError> {
        self.insert_custom_equipment_type(new_custom_type_id(), draft)
    }

    fn insert_custom_equipment_type(
        &mut self,
        id: EquipmentTypeId,
        draft: EquipmentTypeDraft,
    ) -> Result<EquipmentTypeId, ValidationError> {
        if is_built_in_id(id.as_str()) {
            return Err(ValidationError::BuiltInEquipmentType(id.to_string()));
        }
        let built = draft.build(id)?;
        let id = built.id.clone();
        self.custom_equipment_types.push(built);
        Ok(id)
    }

    pub fn update_custom_equipment_type(
        &mut self,
        id: &str,
        draft: EquipmentTypeDraft,
    ) -> Result<(), ValidationError> {
        if is_built_in_id(id) {
            return Err(ValidationError::BuiltInEquipmentType(id.to_string()));
        }
        let slot = self
            .custom_equipment_types
            .iter_mut()
            .find(|t| t.id.as_str() == id)
            .ok_or_else(|| ValidationError::EquipmentTypeNotFound(id.to_string()))?;
        *slot = draft.build(slot.id.clone())?;
        Ok(())
    }

    pub fn delete_custom_equipment_type(&mut self, id: &str) -> Result<EquipmentType, ValidationError> {
        if is_built_in_id(id) {
            return Err(ValidationError::BuiltInEquipmentType(id.to_string()));
        }
        let idx = self
            .custom_equipment_types
            .iter()
            .position(|t| t.id.as_str() == id)
            .ok_or_else(|| ValidationError::EquipmentTypeNotFound(id.to_string()))?;
        Ok(self.custom_equipment_types.remove(idx))
    }

    // --- seed files -------------------------------------------------------

    /// Apply a seed: custom types are added or updated by id, templates are
    /// added (or replaced when their id matches an existing user template),
    /// dropdown items are appended when not already present.
    pub fn apply_seed(&mut self, seed: SettingsSeed) -> Result<SeedSummary, ValidationError> {
        let mut summary = SeedSummary::default();

        for entry in seed.equipment_types {
            match entry.id {
                Some(id) if self.custom_equipment_types.iter().any(|t| t.id == id) => {
                    self.update_custom_equipment_type(id.as_str(), entry.draft)?;
                    summary.types_updated += 1;
                }
                Some(id) => {
                    self.insert_custom_equipment_type(id, entry.draft)?;
                    summary.types_added += 1;
                }
                None => {
                    self.add_custom_equipment_type(entry.draft)?;
                    summary.types_added += 1;
                }
            }
        }

        for mut template in seed.templates {
            let existing = self
                .templates
                .iter()
                .any(|t| !t.is_default && !template.id.as_str().is_empty() && t.id == template.id);
            if existing {
                let id = template.id.clone();
                self.update_template(id.as_str(), template)?;
                summary.templates_updated += 1;
            } else {
                template.validate()?;
                if template.id.as_str().is_empty() || self.template(template.id.as_str()).is_some() {
                    template.id = new_template_id();
                }
                template.is_default = false;
                self.templates.push(template);
                summary.templates_added += 1;
            }
        }

        for (key, items) in seed.dropdown_options {
            let list = self.dropdown_options.entry(key).or_default();
            for item in items {
                let item = item.trim().to_string();
                if !item.is_empty() && !list.contains(&item) {
                    list.push(item);
                    summary.dropdown_items_added += 1;
                }
            }
        }

        Ok(summary)
    }
}

fn is_built_in_id(id: &str) -> bool {
    EquipmentTypeRegistry::new()
        .lookup(id)
        .is_some_and(|t| t.is_built_in)
}

// ---------------------------------------------------------------------------
// Seed files
// ---------------------------------------------------------------------------

/// Custom equipment type as written in a seed file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedEquipmentType {
    #[serde(default)]
    pub id: Option<EquipmentTypeId>,
    #[serde(flatten)]
    pub draft: EquipmentTypeDraft,
}

/// YAML bootstrap document.
///
/// ```yaml
/// equipmentTypes:
///   - id: eq_moisture
///     label: Moisture Meter
///     shortLabel: MM
///     reportCodePrefix: MMR
///     steps: [templateData, comments, assetInfo]
///     assetFields:
///       - { key: probeType, label: Probe Type, type: text }
/// templates:
///   - id: tpl_moisture
///     name: Moisture Standard
///     equipmentType: eq_moisture
///     params:
///       - { id: m1, name: Moisture, unit: "%" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsSeed {
    pub equipment_types: Vec<SeedEquipmentType>,
    pub templates: Vec<Template>,
    pub dropdown_options: BTreeMap<String, Vec<String>>,
}

impl SettingsSeed {
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self, CoreError> {
        serde_yaml::from_str(content).map_err(|source| CoreError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub types_added: usize,
    pub types_updated: usize,
    pub templates_added: usize,
    pub templates_updated: usize,
    pub dropdown_items_added: usize,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_CATEGORIES: [&str; 6] = [
    "Cleaning",
    "Calibration",
    "Adjustments",
    "Faults",
    "Access",
    "Recommendations",
];

pub const DEFAULT_UNITS: [&str; 19] = [
    "", "t/h", "t", "s", "revs", "Hz", "°", "mV", "mV/V", "mm", "m", "m/s", "kg/m", "kg", "I/m", "I/B",
    "%", "% Q", "lb",
];

fn default_dropdowns() -> BTreeMap<String, Vec<String>> {
    let lists: [(&str, &[&str]); 10] = [
        (
            "serviceTypes",
            &["12 Weekly", "6 Monthly", "Annual", "Commissioning", "Breakdown", "Other"],
        ),
        ("scaleTypes", &["CST PCS 2-2", "CST PCS2-2", "SRO BA44", "SRO BA 44 ss"]),
        ("integratorTypes", &["Microtech 9101", "Microtech 3101", "Schenck Tersus"]),
        ("speedInputs", &["SRO Spiral Cage", "AI Spiral Cage", "Encoder"]),
        ("billetWeightTypes", &["Store in Place", "SIP", "Hang On"]),
        (
            "rollerTypes",
            &["HDPE - Cams", "HDPE - Screws", "Steel - Cams", "Steel - Screws"],
        ),
        ("conditions", &["Good", "Fair", "Poor", "N/A"]),
        ("tmdFrameTypes", &["Thermo", "Standard", "Heavy Duty"]),
        ("tmdControllers", &["Oretronic 6", "Eriez", "Bunting"]),
        ("tmdSpeedInputs", &["Fixed", "Variable", "Encoder"]),
    ];
    lists
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn default_comments() -> Vec<CommentEntry> {
    const COMMENTS: [(&str, &str); 22] = [
        ("Cleaning", "Scale was found clean and required little cleaning."),
        ("Cleaning", "Small amount of coal build up cleaned prior to testing."),
        (
            "Cleaning",
            "Significant material build up found on weigher frame and cleaned prior to calibration.",
        ),
        ("Cleaning", "Return rollers in weigh area had significant build up, cleaned."),
        (
            "Calibration",
            "Zero and span calibrations were performed and weighing performance was repeatable.",
        ),
        (
            "Calibration",
            "Span calibrations weren't able to be performed due to [REASON].",
        ),
        ("Calibration", "3 monthly inspections and calibration completed."),
        (
            "Adjustments",
            "Speed and length adjusted as a new belt was installed last shutdown.",
        ),
        ("Adjustments", "Adjusted speed and length prior to calibrations."),
        (
            "Adjustments",
            "Length and speed have not been adjusted as integrator settings are very close to actual readings.",
        ),
        (
            "Adjustments",
            "Integrator speed didn't match actual speed and was adjusted prior to testing.",
        ),
        ("Adjustments", "No change in rev time or belt length."),
        (
            "Faults",
            "Found integrator with a loadcell fault, worth monitoring for recurrence.",
        ),
        ("Faults", "Integrator display is starting to get heat damage on one side."),
        (
            "Faults",
            "Speed sensor can't be greased due to access restrictions. This should be monitored.",
        ),
        (
            "Faults",
            "A return roller in the weigh area is causing vibration issues, recommended to be moved.",
        ),
        ("Access", "Conveyor walkway barricaded off due to rusted cross beams."),
        ("Access", "Access restrictions prevented [TASK] from being completed."),
        (
            "Recommendations",
            "Roller replacement recommended, refer to recommended change date.",
        ),
        (
            "Recommendations",
            "Speed sensor greasing required at next available opportunity.",
        ),
        (
            "Recommendations",
            "Load cell readings should be monitored for drift at next service.",
        ),
        ("Recommendations", "See previous report comment below."),
    ];
    COMMENTS
        .iter()
        .enumerate()
        .map(|(i, (cat, text))| CommentEntry {
            id: format!("c{}", i + 1),
            cat: cat.to_string(),
            text: text.to_string(),
            on: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::AssetField;
    use crate::template::{ParamKind, TemplateParam};

    fn draft() -> EquipmentTypeDraft {
        EquipmentTypeDraft {
            label: "Moisture Meter".into(),
            short_label: "MM".into(),
            report_code_prefix: "MMR".into(),
            asset_fields: vec![AssetField::new("probe", "Probe", crate::AssetFieldType::Text, None)],
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_populated() {
        let s = ReportingSettings::default();
        assert_eq!(s.comment_library.len(), 22);
        assert_eq!(s.categories.len(), 6);
        assert_eq!(s.dropdown("serviceTypes")[0], "12 Weekly");
        assert!(s.dropdown("missing").is_empty());
        assert_eq!(s.templates.len(), 3);
    }

    #[test]
    fn partial_document_overlays_defaults() {
        let s: ReportingSettings =
            serde_json::from_str(r#"{"units":["t"],"conditionColors":{"Poor":"red"}}"#).unwrap();
        assert_eq!(s.units, vec!["t"]);
        assert_eq!(s.condition_colors["Poor"], "red");
        assert_eq!(s.templates.len(), 3);
        assert_eq!(s.comment_library.len(), 22);
    }

    #[test]
    fn category_crud() {
        let mut s = ReportingSettings::default();
        assert_eq!(s.add_category("  "), Err(ValidationError::Required("category name")));
        assert_eq!(
            s.add_category("Faults"),
            Err(ValidationError::DuplicateCategory("Faults".into()))
        );
        s.add_category(" Safety ").unwrap();
        assert!(s.categories.contains(&"Safety".to_string()));

        s.rename_category("Faults", "Issues").unwrap();
        assert!(s.comment_library.iter().any(|c| c.cat == "Issues"));
        assert!(!s.comment_library.iter().any(|c| c.cat == "Faults"));
        assert!(s.rename_category("Issues", "Access").is_err());

        s.remove_category("Issues");
        assert!(!s.categories.contains(&"Issues".to_string()));
        assert!(!s.comment_library.iter().any(|c| c.cat == "Issues"));
    }

    #[test]
    fn comment_crud() {
        let mut s = ReportingSettings::default();
        let id = s.add_comment("Safety", "Guard missing.").unwrap();
        assert!(s.categories.contains(&"Safety".to_string()));
        assert_eq!(s.toggle_comment(&id), Ok(false));
        s.update_comment(
            &id,
            CommentPatch {
                text: Some("Guard refitted.".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let entry = s.comment_library.iter().find(|c| c.id == id).unwrap();
        assert_eq!(entry.text, "Guard refitted.");
        assert!(!entry.on);
        s.delete_comment(&id).unwrap();
        assert_eq!(s.delete_comment(&id), Err(ValidationError::CommentNotFound(id)));
    }

    #[test]
    fn dropdown_and_unit_crud() {
        let mut s = ReportingSettings::default();
        s.add_dropdown_item("conditions", " Replaced ").unwrap();
        assert_eq!(s.dropdown("conditions").last().unwrap(), "Replaced");
        assert!(s.add_dropdown_item("conditions", " ").is_err());
        assert_eq!(s.remove_dropdown_item("conditions", 0).unwrap(), "Good");
        assert!(matches!(
            s.remove_dropdown_item("conditions", 99),
            Err(ValidationError::DropdownIndex { .. })
        ));
        assert!(matches!(
            s.remove_dropdown_item("nope", 0),
            Err(ValidationError::UnknownDropdown(_))
        ));

        assert!(s.add_unit("t").is_err());
        s.add_unit("bar").unwrap();
        s.remove_unit("bar");
        assert!(!s.units.contains(&"bar".to_string()));
    }

    #[test]
    fn condition_colors_set_and_clear() {
        let mut s = ReportingSettings::default();
        s.set_condition_color("Poor", Some("#f00"));
        assert_eq!(s.condition_colors["Poor"], "#f00");
        s.set_condition_color("Poor", Some(""));
        assert!(s.condition_colors.is_empty());
    }

    #[test]
    fn template_crud() {
        let mut s = ReportingSettings::default();
        assert_eq!(
            s.delete_template("tpl_mt9101"),
            Err(ValidationError::DefaultTemplate("tpl_mt9101".into()))
        );

        let copy = s.duplicate_template("tpl_tmd_standard").unwrap();
        assert_eq!(s.templates_for("tmd").count(), 2);

        let mut edited = s.template(copy.as_str()).unwrap().clone();
        edited.name = "TMD Short".into();
        edited.params.truncate(2);
        s.update_template(copy.as_str(), edited).unwrap();
        assert_eq!(s.template(copy.as_str()).unwrap().params.len(), 2);
        assert!(s.template_by_name("tmd", "TMD Short").is_some());
        assert!(s.template_by_name("belt_weigher", "TMD Short").is_none());

        s.delete_template(copy.as_str()).unwrap();
        assert_eq!(s.templates_for("tmd").count(), 1);
    }

    #[test]
    fn add_template_forces_user_id() {
        let mut s = ReportingSettings::default();
        let mut t = s.template("tpl_mt9101").unwrap().clone();
        t.name = "Mine".into();
        let id = s.add_template(t).unwrap();
        assert_ne!(id.as_str(), "tpl_mt9101");
        assert!(!s.template(id.as_str()).unwrap().is_default);
    }

    #[test]
    fn custom_type_crud_guards_built_ins() {
        let mut s = ReportingSettings::default();
        let id = s.add_custom_equipment_type(draft()).unwrap();
        assert!(id.as_str().starts_with("eq_"));

        let mut d = draft();
        d.label = "Moisture Probe".into();
        s.update_custom_equipment_type(id.as_str(), d).unwrap();
        assert_eq!(s.custom_equipment_types[0].label, "Moisture Probe");

        assert!(matches!(
            s.update_custom_equipment_type("belt_weigher", draft()),
            Err(ValidationError::BuiltInEquipmentType(_))
        ));
        assert!(matches!(
            s.delete_custom_equipment_type("tmd"),
            Err(ValidationError::BuiltInEquipmentType(_))
        ));
        assert!(matches!(
            s.delete_custom_equipment_type("eq_missing"),
            Err(ValidationError::EquipmentTypeNotFound(_))
        ));
        s.delete_custom_equipment_type(id.as_str()).unwrap();
        assert!(s.custom_equipment_types.is_empty());
    }

    #[test]
    fn seed_yaml_applies() {
        let yaml = r#"
equipmentTypes:
  - id: eq_moisture
    label: Moisture Meter
    shortLabel: mm
    reportCodePrefix: mmr
    steps: [templateData, comments]
    assetFields:
      - { key: probeType, label: Probe Type, type: text }
      - { key: probeCond, label: Probe Condition, type: condition }
templates:
  - id: tpl_moisture
    name: Moisture Standard
    equipmentType: eq_moisture
    params:
      - { id: m1, name: Moisture, unit: "%" }
      - { id: m2, name: Probe Serial, type: val }
dropdownOptions:
  conditions: [Good, Replaced]
"#;
        let seed = SettingsSeed::from_yaml_str(yaml, Path::new("seed.yaml")).unwrap();
        let mut s = ReportingSettings::default();
        let summary = s.apply_seed(seed.clone()).unwrap();
        assert_eq!(summary.types_added, 1);
        assert_eq!(summary.templates_added, 1);
        assert_eq!(summary.dropdown_items_added, 1);

        let t = &s.custom_equipment_types[0];
        assert_eq!(t.id.as_str(), "eq_moisture");
        assert_eq!(t.report_code_prefix, "MMR");
        assert_eq!(t.default_ast["probeCond"], "Good");

        let tpl = s.template("tpl_moisture").unwrap();
        assert_eq!(tpl.params[0].kind, ParamKind::Cal);
        assert_eq!(tpl.params[1], TemplateParam::new("m2", "Probe Serial", "", ParamKind::Val));

        let again = s.apply_seed(seed).unwrap();
        assert_eq!(again.types_updated, 1);
        assert_eq!(again.templates_updated, 1);
        assert_eq!(again.dropdown_items_added, 0);
        assert_eq!(s.custom_equipment_types.len(), 1);
    }

    #[test]
    fn bad_seed_yaml_reports_path() {
        let err = SettingsSeed::from_yaml_str("equipmentTypes: [", Path::new("bad.yaml")).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
