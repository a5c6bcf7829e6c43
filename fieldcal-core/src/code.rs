//! Report code and file name generation.
//!
//! The code is `{YYYY}.{MM}.{DD}-{PREFIX}{job}-{conveyor}`. The same string is
//! shown in the form, used as the stored file name and embedded in the
//! archival record.

use chrono::{Datelike, Local, NaiveDate};

use crate::equipment::EquipmentTypeRegistry;
use crate::form::ServiceInfo;
use crate::utils::parse_date;

pub const DEFAULT_JOB_NUMBER: &str = "00000";
pub const DEFAULT_CONVEYOR: &str = "CV00";

/// Report code for `service` under the resolved type's prefix. An unset or
/// unparsable service date uses today's local date.
pub fn generate(service: &ServiceInfo, equipment_type: &str, registry: &EquipmentTypeRegistry) -> String {
    generate_with_today(service, equipment_type, registry, Local::now().date_naive())
}

pub fn generate_with_today(
    service: &ServiceInfo,
    equipment_type: &str,
    registry: &EquipmentTypeRegistry,
    today: NaiveDate,
) -> String {
    let prefix = registry.resolve(equipment_type).report_code_prefix;
    format_code(service, &prefix, today)
}

/// `{code}.pdf`.
pub fn file_name(code: &str) -> String {
    format!("{code}.pdf")
}

fn format_code(service: &ServiceInfo, prefix: &str, today: NaiveDate) -> String {
    let date = parse_date(&service.date).unwrap_or(today);
    let job = non_empty(&service.job_number, DEFAULT_JOB_NUMBER);
    let cv = non_empty(&service.cv, DEFAULT_CONVEYOR);
    format!(
        "{:04}.{:02}.{:02}-{prefix}{job}-{cv}",
        date.year(),
        date.month(),
        date.day()
    )
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(date: &str, job: &str, cv: &str) -> ServiceInfo {
        ServiceInfo {
            date: date.into(),
            job_number: job.into(),
            cv: cv.into(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
    }

    #[test]
    fn belt_weigher_code() {
        let reg = EquipmentTypeRegistry::new();
        let code = generate_with_today(&svc("2024-03-05", "4521", "CV05"), "belt_weigher", &reg, today());
        assert_eq!(code, "2024.03.05-CALR4521-CV05");
        assert_eq!(file_name(&code), "2024.03.05-CALR4521-CV05.pdf");
    }

    #[test]
    fn defaults_fill_missing_parts() {
        let reg = EquipmentTypeRegistry::new();
        assert_eq!(
            generate_with_today(&svc("", "", ""), "tmd", &reg, today()),
            "2025.01.09-TMDR00000-CV00"
        );
    }

    #[test]
    fn unknown_type_uses_default_prefix() {
        let reg = EquipmentTypeRegistry::new();
        assert_eq!(
            generate_with_today(&svc("2024-12-01", "7", "CV1"), "eq_gone", &reg, today()),
            "2024.12.01-CALR7-CV1"
        );
    }

    #[test]
    fn code_is_stable_across_calls() {
        let reg = EquipmentTypeRegistry::new();
        let s = svc("2024-05-01", "1001", "CV12");
        assert_eq!(generate(&s, "belt_weigher", &reg), generate(&s, "belt_weigher", &reg));
    }
}
