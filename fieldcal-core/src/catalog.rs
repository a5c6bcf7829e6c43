//! Settings bundle plus the equipment-type registry built from it.
//!
//! Every form operation that needs a type schema or the template list takes a
//! `&Catalog`. Mutations go through [`Catalog::update`] so the registry is
//! re-populated whenever the custom types might have changed.

use crate::equipment::{EquipmentType, EquipmentTypeDraft, EquipmentTypeRegistry};
use crate::error::ValidationError;
use crate::settings::ReportingSettings;
use crate::template::Template;
use crate::types::EquipmentTypeId;

#[derive(Debug, Clone)]
pub struct Catalog {
    settings: ReportingSettings,
    registry: EquipmentTypeRegistry,
    rejected: Vec<EquipmentTypeId>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(ReportingSettings::default())
    }
}

impl Catalog {
    pub fn new(settings: ReportingSettings) -> Self {
        let mut catalog = Self {
            settings,
            registry: EquipmentTypeRegistry::new(),
            rejected: Vec::new(),
        };
        catalog.sync_registry();
        catalog
    }

    pub fn settings(&self) -> &ReportingSettings {
        &self.settings
    }

    pub fn registry(&self) -> &EquipmentTypeRegistry {
        &self.registry
    }

    pub fn into_settings(self) -> ReportingSettings {
        self.settings
    }

    /// Custom type ids skipped at the last registration because they
    /// collided with a built-in or an earlier entry.
    pub fn rejected_custom_types(&self) -> &[EquipmentTypeId] {
        &self.rejected
    }

    pub fn resolve(&self, id: &str) -> EquipmentType {
        self.registry.resolve(id)
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.settings.template(id)
    }

    /// Mutate the settings, then re-register custom types.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut ReportingSettings) -> R) -> R {
        let out = f(&mut self.settings);
        self.sync_registry();
        out
    }

    pub fn replace_settings(&mut self, settings: ReportingSettings) {
        self.settings = settings;
        self.sync_registry();
    }

    pub fn add_custom_equipment_type(
        &mut self,
        draft: EquipmentTypeDraft,
    ) -> Result<EquipmentTypeId, ValidationError> {
        self.update(|s| s.add_custom_equipment_type(draft))
    }

    pub fn update_custom_equipment_type(
        &mut self,
        id: &str,
        draft: EquipmentTypeDraft,
    ) -> Result<(), ValidationError> {
        self.update(|s| s.update_custom_equipment_type(id, draft))
    }

    pub fn delete_custom_equipment_type(&mut self, id: &str) -> Result<EquipmentType, ValidationError> {
        self.update(|s| s.delete_custom_equipment_type(id))
    }

    fn sync_registry(&mut self) {
        self.rejected = self
            .registry
            .register_custom_types(self.settings.custom_equipment_types.clone());
    }
}
