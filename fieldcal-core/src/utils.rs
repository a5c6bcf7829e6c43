//! Numeric and date helpers shared by the form, the archival mapper and the
//! renderer.
//!
//! `"-"` is the "no data" sentinel throughout. It is never an error and never
//! a stand-in for zero.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// The "not computable" sentinel.
pub const NO_DATA: &str = "-";

/// Difference between an "as found"/"old" and an "as left"/"new" reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// `b - a`, three decimals, or `"-"`.
    pub diff: String,
    /// `diff / a * 100`, two decimals, or `"-"`.
    pub pct: String,
}

impl Delta {
    pub fn none() -> Self {
        Self {
            diff: NO_DATA.to_string(),
            pct: NO_DATA.to_string(),
        }
    }

    pub fn is_computable(&self) -> bool {
        self.diff != NO_DATA
    }
}

/// Compute the calibration delta between `a` and `b`.
///
/// Either side failing to parse yields `{diff: "-", pct: "-"}`. A zero `a`
/// yields `pct = "0.00"`.
pub fn diff(a: &str, b: &str) -> Delta {
    let (Some(an), Some(bn)) = (parse_decimal(a), parse_decimal(b)) else {
        return Delta::none();
    };
    let d = bn - an;
    let p = if an != 0.0 { (d / an) * 100.0 } else { 0.0 };
    Delta {
        diff: to_fixed(d, 3),
        pct: to_fixed(p, 2),
    }
}

/// Parse the leading decimal number of `s`, ignoring leading whitespace and
/// any trailing text (`"10 t/h"` parses as `10`).
///
/// Returns `None` when no digits lead the string or the value is not finite.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    // Optional exponent, only taken when complete.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Every finite `f64` has at most this many fractional decimal digits.
const MAX_FRACTION_DIGITS: usize = 1074;

/// Fixed-point formatting with ECMAScript `toFixed` rounding: the magnitude
/// is rounded to the nearest `places`-digit decimal, ties going away from
/// zero. Negative zero prints as positive zero; small negative values keep
/// their sign (`-0.000`).
fn to_fixed(value: f64, places: usize) -> String {
    if value == 0.0 {
        return format!("{:.places$}", 0.0);
    }
    // Exact expansion of the binary value; rounding happens on these digits.
    let exact = format!("{:.*}", MAX_FRACTION_DIGITS, value.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(places))
        .map(|b| b - b'0')
        .collect();
    if frac_part.as_bytes().get(places).is_some_and(|&b| b >= b'5') {
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == 9 {
                *d = 0;
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, 1);
        }
    }

    let int_len = digits.len() - places;
    let mut out = String::with_capacity(digits.len() + 2);
    if value < 0.0 {
        out.push('-');
    }
    for (i, d) in digits.iter().enumerate() {
        if i == int_len {
            out.push('.');
        }
        out.push(char::from(b'0' + d));
    }
    out
}

/// Parse a date-only string. Accepts `YYYY-MM-DD`, optionally followed by a
/// time component (`2024-05-01T00:00:00Z`).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Advance `date` by `floor(months)` calendar months, as `YYYY-MM-DD`.
///
/// Empty input on either side yields `""`, as does anything unparsable. A
/// day that does not exist in the target month rolls forward into the next
/// month (`2024-01-31` + 1 → `2024-03-02`).
pub fn add_months(date: &str, months: &str) -> String {
    if date.trim().is_empty() || months.trim().is_empty() {
        return String::new();
    }
    let (Some(start), Some(months)) = (parse_date(date), parse_decimal(months)) else {
        return String::new();
    };
    let months = months.floor() as i64;
    month_overflow_add(start, months)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn month_overflow_add(start: NaiveDate, months: i64) -> Option<NaiveDate> {
    let first = start.with_day(1)?;
    let shifted = if months >= 0 {
        first.checked_add_months(Months::new(u32::try_from(months).ok()?))?
    } else {
        first.checked_sub_months(Months::new(u32::try_from(-months).ok()?))?
    };
    shifted.checked_add_days(chrono::Days::new(u64::from(start.day() - 1)))
}

/// Long display date, e.g. `Wednesday, 1 May 2024`. Empty input yields
/// `"-"`. Unparsable input is returned unchanged.
pub fn format_long_date(date: &str) -> String {
    if date.trim().is_empty() {
        return NO_DATA.to_string();
    }
    match parse_date(date) {
        Some(d) => d.format("%A, %-d %B %Y").to_string(),
        None => date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "1")]
    #[case("abc", "1")]
    #[case("1", "x")]
    #[case("-", "-")]
    #[case(".", "2")]
    fn diff_sentinel_for_unparsable(#[case] a: &str, #[case] b: &str) {
        assert_eq!(diff(a, b), Delta::none());
    }

    #[test]
    fn diff_basic() {
        let d = diff("100", "110");
        assert_eq!(d.diff, "10.000");
        assert_eq!(d.pct, "10.00");
    }

    #[test]
    fn diff_zero_base_has_zero_pct() {
        let d = diff("0", "5");
        assert_eq!(d.diff, "5.000");
        assert_eq!(d.pct, "0.00");
    }

    #[test]
    fn diff_negative() {
        let d = diff("100", "98");
        assert_eq!(d.diff, "-2.000");
        assert_eq!(d.pct, "-2.00");
    }

    #[test]
    fn diff_equal_negative_base_is_unsigned_zero() {
        let d = diff("-5", "-5");
        assert_eq!(d.diff, "0.000");
        assert_eq!(d.pct, "0.00");
    }

    #[rstest]
    #[case("1", "1.0625", "0.063", "6.25")]
    #[case("2", "2.0625", "0.063", "3.13")]
    #[case("800", "801", "1.000", "0.13")]
    #[case("1.0625", "1", "-0.063", "-5.88")]
    #[case("8", "7", "-1.000", "-12.50")]
    #[case("1", "1.0005", "0.000", "0.05")]
    fn diff_ties_round_away_from_zero(
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected_diff: &str,
        #[case] expected_pct: &str,
    ) {
        let d = diff(a, b);
        assert_eq!(d.diff, expected_diff);
        assert_eq!(d.pct, expected_pct);
    }

    #[rstest]
    #[case(0.5, 0, "1")]
    #[case(-0.5, 0, "-1")]
    #[case(9.995, 2, "9.99")]
    #[case(99.9996, 3, "100.000")]
    #[case(-0.0001, 3, "-0.000")]
    #[case(-0.0, 2, "0.00")]
    #[case(1234.5, 1, "1234.5")]
    fn to_fixed_cases(#[case] value: f64, #[case] places: usize, #[case] expected: &str) {
        assert_eq!(to_fixed(value, places), expected);
    }

    #[rstest]
    #[case("10 t/h", Some(10.0))]
    #[case("  3.5", Some(3.5))]
    #[case(".5", Some(0.5))]
    #[case("5.", Some(5.0))]
    #[case("-2e3x", Some(-2000.0))]
    #[case("1e", Some(1.0))]
    #[case("inf", None)]
    #[case("NaN", None)]
    #[case("+", None)]
    fn parse_decimal_prefix(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_decimal(input), expected);
    }

    #[rstest]
    #[case("2024-01-31", "1", "2024-03-02")]
    #[case("2024-05-01", "3", "2024-08-01")]
    #[case("2024-11-15", "3", "2025-02-15")]
    #[case("2024-06-15", "2.9", "2024-08-15")]
    #[case("2024-06-15", "12", "2025-06-15")]
    #[case("2024-03-31", "-1", "2024-03-02")]
    #[case("2024-05-01T09:30:00Z", "1", "2024-06-01")]
    fn add_months_cases(#[case] date: &str, #[case] months: &str, #[case] expected: &str) {
        assert_eq!(add_months(date, months), expected);
    }

    #[test]
    fn add_months_empty_inputs() {
        assert_eq!(add_months("", "3"), "");
        assert_eq!(add_months("2024-06-15", ""), "");
        assert_eq!(add_months("not a date", "3"), "");
    }

    #[test]
    fn long_date_formatting() {
        assert_eq!(format_long_date(""), "-");
        assert_eq!(format_long_date("2024-05-01"), "Wednesday, 1 May 2024");
        assert_eq!(format_long_date("garbage"), "garbage");
    }
}
