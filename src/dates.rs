//! Date normalization to `YYYY-MM-DD`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RowErrorKind;
use crate::models::CellValue;

/// How to read ambiguous numeric dates such as `03/04/2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DateLocale {
    #[default]
    MonthFirst,
    DayFirst,
}

pub trait DateNormalizer: Send + Sync {
    fn normalize(&self, raw: &CellValue) -> Result<String, RowErrorKind>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocaleDateNormalizer {
    locale: DateLocale,
}

impl LocaleDateNormalizer {
    pub fn new(locale: DateLocale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> DateLocale {
        self.locale
    }
}

impl DateNormalizer for LocaleDateNormalizer {
    fn normalize(&self, raw: &CellValue) -> Result<String, RowErrorKind> {
        let date = match raw {
            CellValue::Date(d) => Some(*d),
            CellValue::DateTime(dt) => Some(dt.date()),
            CellValue::Number(serial) => excel_serial_to_date(*serial),
            CellValue::Text(s) => parse_date(s, self.locale),
            CellValue::Empty => None,
        };
        date.map(|d| d.format("%Y-%m-%d").to_string())
            .ok_or_else(|| RowErrorKind::UnparseableDate { raw: raw.to_text() })
    }
}

/// Spreadsheet serial day number to a date.
///
/// Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug).
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))
}

// %B accepts both full and abbreviated month names when parsing. Two-digit
// year forms come first so "24" is never read as the year 0024.
const NAMED_MONTH_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%d-%B-%y",
    "%d-%B-%Y",
    "%B-%d-%Y",
    "%d/%B/%Y",
];

/// Parse a textual date under the given locale preference.
pub fn parse_date(raw: &str, locale: DateLocale) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    // Drop a time component: "2024-01-02T10:00:00", "01/02/2024 10:00"
    let s = match (s.get(..10), s.as_bytes().get(10)) {
        (Some(day), Some(b'T')) => day,
        _ => s,
    };
    let words = s.split_whitespace().collect::<Vec<_>>();
    let date_part = match words.as_slice() {
        [only] => only.to_string(),
        [first, second, ..] if second.contains(':') => first.to_string(),
        parts => parts.join(" "),
    };

    parse_numeric(&date_part, locale).or_else(|| parse_named_month(&date_part))
}

fn parse_numeric(s: &str, locale: DateLocale) -> Option<NaiveDate> {
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let y = s[0..4].parse().ok()?;
        let m = s[4..6].parse().ok()?;
        let d = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    let sep = ['/', '-', '.'].into_iter().find(|c| s.contains(*c))?;
    let parts: Vec<&str> = s.split(sep).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    if parts[0].len() == 4 {
        let y = parts[0].parse().ok()?;
        let m = parts[1].parse().ok()?;
        let d = parts[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    let a: u32 = parts[0].parse().ok()?;
    let b: u32 = parts[1].parse().ok()?;
    let year = expand_year(parts[2])?;
    let (first, second) = match locale {
        DateLocale::MonthFirst => ((a, b), (b, a)),
        DateLocale::DayFirst => ((b, a), (a, b)),
    };
    NaiveDate::from_ymd_opt(year, first.0, first.1)
        .or_else(|| NaiveDate::from_ymd_opt(year, second.0, second.1))
}

fn expand_year(raw: &str) -> Option<i32> {
    let y: i32 = raw.parse().ok()?;
    match raw.len() {
        4 => Some(y),
        2 if y <= 68 => Some(2000 + y),
        2 => Some(1900 + y),
        _ => None,
    }
}

fn parse_named_month(s: &str) -> Option<NaiveDate> {
    // "Jan. 4, 2024" -> "Jan 4, 2024"
    let cleaned = s.replace('.', "");
    NAMED_MONTH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str, locale: DateLocale) -> Option<String> {
        LocaleDateNormalizer::new(locale)
            .normalize(&CellValue::Text(raw.to_string()))
            .ok()
    }

    #[test]
    fn test_common_formats() {
        let cases = [
            ("01/02/2024", "2024-01-02"),
            ("2024-01-02", "2024-01-02"),
            ("2024/01/02", "2024-01-02"),
            ("20240102", "2024-01-02"),
            ("Jan 2, 2024", "2024-01-02"),
            ("January 2, 2024", "2024-01-02"),
            ("2 Jan 2024", "2024-01-02"),
            ("4-Jan-2024", "2024-01-04"),
            ("04-JAN-24", "2024-01-04"),
            ("01-02-2024", "2024-01-02"),
            ("1/2/24", "2024-01-02"),
            ("2024-01-02T10:30:00", "2024-01-02"),
            ("01/02/2024 10:30", "2024-01-02"),
        ];
        for (raw, expected) in cases {
            assert_eq!(norm(raw, DateLocale::MonthFirst).as_deref(), Some(expected), "{raw}");
        }
    }

    #[test]
    fn test_locale_preference_for_ambiguous_dates() {
        assert_eq!(norm("03/04/2024", DateLocale::MonthFirst).as_deref(), Some("2024-03-04"));
        assert_eq!(norm("03/04/2024", DateLocale::DayFirst).as_deref(), Some("2024-04-03"));
        assert_eq!(norm("03.04.2024", DateLocale::DayFirst).as_deref(), Some("2024-04-03"));
    }

    #[test]
    fn test_unambiguous_dates_resolve_under_either_locale() {
        assert_eq!(norm("14/03/2024", DateLocale::MonthFirst).as_deref(), Some("2024-03-14"));
        assert_eq!(norm("03/14/2024", DateLocale::DayFirst).as_deref(), Some("2024-03-14"));
    }

    #[test]
    fn test_invalid_calendar_dates_fail() {
        for locale in [DateLocale::MonthFirst, DateLocale::DayFirst] {
            assert_eq!(norm("32/13/2024", locale), None);
            assert_eq!(norm("02/30/2025", locale), None);
            assert_eq!(norm("2023-02-29", locale), None);
            assert_eq!(norm("not a date", locale), None);
            assert_eq!(norm("", locale), None);
        }
        assert_eq!(norm("2024-02-29", DateLocale::MonthFirst).as_deref(), Some("2024-02-29"));
    }

    #[test]
    fn test_two_digit_year_pivot() {
        assert_eq!(norm("1/2/68", DateLocale::MonthFirst).as_deref(), Some("2068-01-02"));
        assert_eq!(norm("1/2/69", DateLocale::MonthFirst).as_deref(), Some("1969-01-02"));
    }

    #[test]
    fn test_typed_values() {
        let n = LocaleDateNormalizer::default();
        let d = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        assert_eq!(n.normalize(&CellValue::Date(d)).unwrap(), "2024-03-14");
        assert_eq!(
            n.normalize(&CellValue::DateTime(d.and_hms_opt(9, 0, 0).unwrap())).unwrap(),
            "2024-03-14"
        );
        assert_eq!(n.normalize(&CellValue::Number(45667.0)).unwrap(), "2025-01-10");
    }

    #[test]
    fn test_unparseable_carries_raw_text() {
        let err = LocaleDateNormalizer::default()
            .normalize(&CellValue::Text("32/13/2024".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            RowErrorKind::UnparseableDate {
                raw: "32/13/2024".to_string()
            }
        );
        assert!(LocaleDateNormalizer::default().normalize(&CellValue::Empty).is_err());
        assert!(LocaleDateNormalizer::default().normalize(&CellValue::Number(-4.0)).is_err());
    }
}
