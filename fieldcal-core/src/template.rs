//! Parameter templates: named, ordered measurement lists scoped to one
//! equipment type, plus the per-parameter value shapes stored in a report.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::equipment::{BELT_WEIGHER, TMD};
use crate::error::ValidationError;
use crate::types::{short_uid, EquipmentTypeId, ParamId, TemplateId};
use crate::utils::{diff, Delta};

/// Shape of a template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// As-found / as-left pair.
    #[default]
    Cal,
    /// Single recorded value.
    Val,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Cal => write!(f, "cal"),
            ParamKind::Val => write!(f, "val"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParam {
    #[serde(default)]
    pub id: ParamId,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "type", default)]
    pub kind: ParamKind,
}

impl TemplateParam {
    pub fn new(id: &str, name: &str, unit: &str, kind: ParamKind) -> Self {
        Self {
            id: ParamId::from(id),
            name: name.to_string(),
            unit: unit.to_string(),
            kind,
        }
    }

    /// Display label: the name, with the unit in parentheses when set.
    pub fn label(&self) -> String {
        if self.unit.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.unit)
        }
    }
}

/// A stored parameter value. The shape is self-describing: an object with a
/// `val` key is a single value, anything else is a calibration pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Val {
        val: String,
    },
    Cal {
        #[serde(default)]
        af: String,
        #[serde(default)]
        al: String,
        #[serde(rename = "incPct", default)]
        inc_pct: bool,
    },
}

impl ParamValue {
    /// Empty value of the given shape.
    pub fn seed(kind: ParamKind) -> Self {
        match kind {
            ParamKind::Cal => ParamValue::Cal {
                af: String::new(),
                al: String::new(),
                inc_pct: false,
            },
            ParamKind::Val => ParamValue::Val { val: String::new() },
        }
    }

    pub fn cal(af: &str, al: &str) -> Self {
        ParamValue::Cal {
            af: af.to_string(),
            al: al.to_string(),
            inc_pct: false,
        }
    }

    pub fn val(val: &str) -> Self {
        ParamValue::Val { val: val.to_string() }
    }

    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Val { .. } => ParamKind::Val,
            ParamValue::Cal { .. } => ParamKind::Cal,
        }
    }

    /// `diff(af, al)` for pairs, `None` for single values.
    pub fn delta(&self) -> Option<Delta> {
        match self {
            ParamValue::Cal { af, al, .. } => Some(diff(af, al)),
            ParamValue::Val { .. } => None,
        }
    }
}

/// A named, ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    /// Templates saved before equipment types existed belong to the belt
    /// weigher.
    #[serde(default = "default_template_type")]
    pub equipment_type: EquipmentTypeId,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub params: Vec<TemplateParam>,
}

fn default_template_type() -> EquipmentTypeId {
    EquipmentTypeId::from(BELT_WEIGHER)
}

/// Fresh id for a new template.
pub fn new_template_id() -> TemplateId {
    TemplateId(format!("tpl_{}", short_uid()))
}

impl Template {
    /// Build a new user template. Params with an empty id get a fresh one.
    pub fn create(
        name: &str,
        desc: &str,
        equipment_type: EquipmentTypeId,
        params: Vec<TemplateParam>,
    ) -> Result<Self, ValidationError> {
        let params = params
            .into_iter()
            .map(|mut p| {
                if p.id.as_str().is_empty() {
                    p.id = ParamId(short_uid());
                }
                p
            })
            .collect();
        let template = Self {
            id: new_template_id(),
            name: name.trim().to_string(),
            desc: desc.to_string(),
            equipment_type,
            is_default: false,
            params,
        };
        template.validate()?;
        Ok(template)
    }

    /// A copy with a fresh template id and fresh ids for every parameter.
    pub fn duplicate(&self) -> Self {
        Self {
            id: new_template_id(),
            name: format!("{} (Copy)", self.name),
            desc: self.desc.clone(),
            equipment_type: self.equipment_type.clone(),
            is_default: false,
            params: self
                .params
                .iter()
                .map(|p| TemplateParam {
                    id: ParamId(short_uid()),
                    ..p.clone()
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("template name"));
        }
        let mut seen = HashSet::new();
        for p in &self.params {
            if !seen.insert(p.id.as_str()) {
                return Err(ValidationError::DuplicateParamId {
                    template: self.id.to_string(),
                    param: p.id.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn param(&self, id: &str) -> Option<&TemplateParam> {
        self.params.iter().find(|p| p.id.as_str() == id)
    }
}

/// Templates offered for `equipment_type`, in list order.
pub fn templates_for<'a>(
    templates: &'a [Template],
    equipment_type: &'a str,
) -> impl Iterator<Item = &'a Template> + 'a {
    templates
        .iter()
        .filter(move |t| t.equipment_type.as_str() == equipment_type)
}

fn cal_params(pairs: &[(&str, &str, &str)]) -> Vec<TemplateParam> {
    pairs
        .iter()
        .map(|(id, name, unit)| TemplateParam::new(id, name, unit, ParamKind::Cal))
        .collect()
}

/// Templates that ship with the catalog.
pub fn built_in_templates() -> Vec<Template> {
    let mt9101 = cal_params(&[
        ("p1", "Scale Capacity", "t/h"),
        ("p2", "Totaliser", "t"),
        ("p3", "Scale Code", ""),
        ("p4", "Revolution Time", "s"),
        ("p5", "Test Revolutions", "revs"),
        ("p6", "Test Duration Pulses", ""),
        ("p7", "Speed Input Hz", "Hz"),
        ("p8", "Incline Angle", "°"),
        ("p9", "LC mV @ Zero", "mV"),
        ("p10", "LC mV @ Span", "mV"),
        ("p11", "Idler Spacing", "mm"),
        ("p12", "Weigh Span", "m"),
        ("p13", "Belt Speed", "m/s"),
        ("p14", "Belt Length", "m"),
        ("p15", "Test Length", "m"),
        ("p16", "Test Time", "s"),
        ("p17", "Kg/m", "kg/m"),
        ("p18", "Target Weight", "t"),
        ("p19", "Simulated Rate", "t/h"),
    ]);
    let schenck = cal_params(&[
        ("s1", "Scale Capacity", "t/h"),
        ("s2", "Totaliser", "t"),
        ("s3", "Revolution Time", "s"),
        ("s4", "Test Revolutions", "revs"),
        ("s5", "Impulses/Belt", ""),
        ("s6", "Speed Input Hz", "Hz"),
        ("s7", "Incline Angle", "°"),
        ("s8", "LC mV/V @ Zero", "mV"),
        ("s9", "LC mV/V @ Span", "mV"),
        ("s10", "Idler Spacing", "mm"),
        ("s11", "Weigh Span", "m"),
        ("s12", "Belt Speed", "m/s"),
        ("s13", "Belt Length", "m"),
        ("s14", "Test Length", "m"),
        ("s15", "Test Time", "s"),
        ("s16", "Kg/m", "kg/m"),
        ("s17", "Target Weight", "t"),
        ("s18", "Simulated Rate", "t/h"),
    ]);
    let mut tmd = cal_params(&[("t1", "Coarse", ""), ("t2", "Fine", "")]);
    tmd.extend(
        [
            ("t3", "Test Piece Pass", ""),
            ("t4", "Test Piece Detect", ""),
            ("t5", "Coil Balance", ""),
            ("t6", "Belt Speed", "m/s"),
            ("t7", "Bar Detection", ""),
            ("t8", "Mat Code", ""),
            ("t9", "Bar Sensitivity", ""),
            ("t10", "Time Delay", "m"),
            ("t11", "Bar Length", "m"),
            ("t12", "OP FRQ", ""),
        ]
        .iter()
        .map(|(id, name, unit)| TemplateParam::new(id, name, unit, ParamKind::Val)),
    );

    let built_in = |id: &str, name: &str, desc: &str, ty: &str, params| Template {
        id: TemplateId::from(id),
        name: name.to_string(),
        desc: desc.to_string(),
        equipment_type: EquipmentTypeId::from(ty),
        is_default: true,
        params,
    };

    vec![
        built_in(
            "tpl_mt9101",
            "Microtech 9101",
            "Standard Microtech 9101 integrator",
            BELT_WEIGHER,
            mt9101,
        ),
        built_in(
            "tpl_schenck",
            "Schenck Tersus",
            "Schenck Tersus with extended block data",
            BELT_WEIGHER,
            schenck,
        ),
        built_in(
            "tpl_tmd_standard",
            "TMD Standard",
            "Standard Tramp Metal Detector template",
            TMD,
            tmd,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_kind_defaults_to_cal() {
        let p: TemplateParam = serde_json::from_str(r#"{"id":"p1","name":"Span"}"#).unwrap();
        assert_eq!(p.kind, ParamKind::Cal);
        assert_eq!(p.unit, "");
    }

    #[test]
    fn legacy_template_without_type_is_belt_weigher() {
        let t: Template = serde_json::from_str(r#"{"id":"tpl_x","name":"Old","params":[]}"#).unwrap();
        assert_eq!(t.equipment_type.as_str(), BELT_WEIGHER);
        assert!(!t.is_default);
    }

    #[test]
    fn value_shape_is_inferred_from_keys() {
        let v: ParamValue = serde_json::from_str(r#"{"val":"7"}"#).unwrap();
        assert_eq!(v, ParamValue::val("7"));
        let c: ParamValue = serde_json::from_str(r#"{"af":"10","al":"12"}"#).unwrap();
        assert_eq!(c, ParamValue::cal("10", "12"));
        let empty: ParamValue = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ParamValue::seed(ParamKind::Cal));
    }

    #[test]
    fn cal_value_serializes_inc_pct() {
        let json = serde_json::to_value(ParamValue::seed(ParamKind::Cal)).unwrap();
        assert_eq!(json, serde_json::json!({"af": "", "al": "", "incPct": false}));
    }

    #[test]
    fn label_includes_unit() {
        assert_eq!(TemplateParam::new("a", "Belt Speed", "m/s", ParamKind::Val).label(), "Belt Speed (m/s)");
        assert_eq!(TemplateParam::new("a", "Coarse", "", ParamKind::Cal).label(), "Coarse");
    }

    #[test]
    fn create_assigns_ids() {
        let t = Template::create(
            " Custom ",
            "",
            EquipmentTypeId::from(TMD),
            vec![
                TemplateParam::new("", "A", "", ParamKind::Cal),
                TemplateParam::new("", "B", "", ParamKind::Val),
            ],
        )
        .unwrap();
        assert!(t.id.as_str().starts_with("tpl_"));
        assert_eq!(t.name, "Custom");
        assert_ne!(t.params[0].id, t.params[1].id);
        assert!(!t.is_default);
    }

    #[test]
    fn create_rejects_empty_name_and_duplicate_ids() {
        let err = Template::create("  ", "", BELT_WEIGHER.into(), vec![]).unwrap_err();
        assert_eq!(err, ValidationError::Required("template name"));

        let dup = vec![
            TemplateParam::new("p1", "A", "", ParamKind::Cal),
            TemplateParam::new("p1", "B", "", ParamKind::Cal),
        ];
        assert!(matches!(
            Template::create("T", "", BELT_WEIGHER.into(), dup),
            Err(ValidationError::DuplicateParamId { .. })
        ));
    }

    #[test]
    fn duplicate_never_shares_ids() {
        let source = &built_in_templates()[0];
        let copy = source.duplicate();
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.name, "Microtech 9101 (Copy)");
        assert!(!copy.is_default);
        assert_eq!(copy.params.len(), source.params.len());
        for (a, b) in copy.params.iter().zip(&source.params) {
            assert_ne!(a.id, b.id);
            assert_eq!(a.name, b.name);
            assert_eq!(a.kind, b.kind);
        }
        copy.validate().unwrap();
    }

    #[test]
    fn built_ins_are_valid_and_filtered() {
        let all = built_in_templates();
        for t in &all {
            t.validate().unwrap();
            assert!(t.is_default);
        }
        let bw: Vec<_> = templates_for(&all, BELT_WEIGHER).map(|t| t.id.as_str()).collect();
        assert_eq!(bw, vec!["tpl_mt9101", "tpl_schenck"]);
        let tmd: Vec<_> = templates_for(&all, TMD).collect();
        assert_eq!(tmd.len(), 1);
        assert_eq!(tmd[0].params.len(), 12);
        assert_eq!(tmd[0].params.iter().filter(|p| p.kind == ParamKind::Cal).count(), 2);
    }
}
