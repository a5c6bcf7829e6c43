//! The fixed zero/span/length/speed calibration block.
//!
//! Only meaningful for equipment types with `has_fixed_cal`; the form holds
//! `None` for every other type.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::utils::{diff, Delta};

/// Fixed calibration readings. Serialized with the short historical keys
/// used by drafts (`oz`, `nz`, …).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(rename = "oz", default)]
    pub old_tare: String,
    #[serde(rename = "nz", default)]
    pub new_tare: String,
    #[serde(rename = "os", default)]
    pub old_span: String,
    #[serde(rename = "ns", default)]
    pub new_span: String,
    #[serde(rename = "zr", default)]
    pub tare_repeatability: String,
    #[serde(rename = "sr", default)]
    pub span_repeatability: String,
    #[serde(rename = "ol", default)]
    pub old_length: String,
    #[serde(rename = "nl", default)]
    pub new_length: String,
    #[serde(rename = "osp", default)]
    pub old_speed: String,
    #[serde(rename = "nsp", default)]
    pub new_speed: String,
}

/// Derived deltas for the four calibration pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationDeltas {
    pub tare: Delta,
    pub span: Delta,
    pub length: Delta,
    pub speed: Delta,
}

impl Calibration {
    /// Field keys in display order.
    pub const KEYS: [&'static str; 10] = ["oz", "nz", "os", "ns", "zr", "sr", "ol", "nl", "osp", "nsp"];

    pub fn deltas(&self) -> CalibrationDeltas {
        CalibrationDeltas {
            tare: diff(&self.old_tare, &self.new_tare),
            span: diff(&self.old_span, &self.new_span),
            length: diff(&self.old_length, &self.new_length),
            speed: diff(&self.old_speed, &self.new_speed),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "oz" => &self.old_tare,
            "nz" => &self.new_tare,
            "os" => &self.old_span,
            "ns" => &self.new_span,
            "zr" => &self.tare_repeatability,
            "sr" => &self.span_repeatability,
            "ol" => &self.old_length,
            "nl" => &self.new_length,
            "osp" => &self.old_speed,
            "nsp" => &self.new_speed,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Set one reading by its short key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ValidationError> {
        let slot = match key {
            "oz" => &mut self.old_tare,
            "nz" => &mut self.new_tare,
            "os" => &mut self.old_span,
            "ns" => &mut self.new_span,
            "zr" => &mut self.tare_repeatability,
            "sr" => &mut self.span_repeatability,
            "ol" => &mut self.old_length,
            "nl" => &mut self.new_length,
            "osp" => &mut self.old_speed,
            "nsp" => &mut self.new_speed,
            other => return Err(ValidationError::UnknownCalibrationField(other.to_string())),
        };
        *slot = value.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_keys_roundtrip() {
        let cal = Calibration {
            old_tare: "100".into(),
            new_tare: "98".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&cal).unwrap();
        assert_eq!(json["oz"], "100");
        assert_eq!(json["nz"], "98");
        let back: Calibration = serde_json::from_value(json).unwrap();
        assert_eq!(back, cal);
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let cal: Calibration = serde_json::from_str(r#"{"oz":"1"}"#).unwrap();
        assert_eq!(cal.old_tare, "1");
        assert_eq!(cal.new_speed, "");
    }

    #[test]
    fn tare_delta_from_fixed_block() {
        let mut cal = Calibration::default();
        cal.set("oz", "100").unwrap();
        cal.set("nz", "98").unwrap();
        let deltas = cal.deltas();
        assert_eq!(deltas.tare.diff, "-2.000");
        assert_eq!(deltas.tare.pct, "-2.00");
        assert_eq!(deltas.span.diff, "-");
    }

    #[test]
    fn every_key_is_addressable() {
        let mut cal = Calibration::default();
        for key in Calibration::KEYS {
            cal.set(key, key).unwrap();
            assert_eq!(cal.get(key), Some(key));
        }
        assert!(cal.set("bogus", "1").is_err());
        assert_eq!(cal.get("bogus"), None);
    }
}
