// Utility helpers for parsing and basic statistics.
//
// Spreadsheet exports mix ISO timestamps, day-first dates and raw Excel
// serials; everything that turns a cell into a typed value lives here so
// the loader and the reports can assume clean values.
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use num_format::{Locale, ToFormattedString};
use std::collections::BTreeMap;

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok()
}

/// Parse a timestamp cell. Date-only values land at midnight; plain numbers
/// in a plausible range are read as Excel serial dates (1900 system).
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    match s.parse::<f64>() {
        Ok(serial) if (1.0..=2_958_465.0).contains(&serial) => excel_serial_to_datetime(serial),
        _ => None,
    }
}

pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::seconds(seconds))
}

/// Whole days between two timestamps, floored like a pandas `Timedelta.days`.
pub fn days_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_seconds().div_euclid(86_400)
}

pub fn parse_flag(s: Option<&str>) -> bool {
    match s.map(|v| v.trim().to_lowercase()) {
        Some(v) => matches!(v.as_str(), "1" | "true" | "si" | "sí" | "s" | "x" | "yes" | "ok"),
        None => false,
    }
}

pub fn average(v: &[f64]) -> f64 {
    // Returns 0 for an empty slice to avoid NaNs in rendered tables.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn median(mut v: Vec<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}

/// Most frequent value. Ties resolve to the lexicographically smallest value
/// so reports do not depend on row order.
pub fn mode<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        if v.is_empty() {
            continue;
        }
        *counts.entry(v).or_insert(0) += 1;
    }
    // BTreeMap iterates in key order, so the first maximum wins the tie.
    let mut best: Option<(&str, usize)> = None;
    for (k, c) in counts {
        match best {
            Some((_, bc)) if bc >= c => {}
            _ => best = Some((k, c)),
        }
    }
    best.map(|(k, _)| k.to_string())
}

pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub fn format_pct(fraction: f64) -> String {
    format!("{}%", format_number(fraction * 100.0, 1))
}

pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals)).unwrap_or_else(|| "-".to_string())
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus thousands separators (e.g. `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Lower-case and strip the Spanish accents so keyword matching is stable
/// across exports that disagree on diacritics.
pub fn fold_text(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        parse_datetime_safe(Some(s)).unwrap()
    }

    #[test]
    fn parses_the_formats_found_in_exports() {
        assert_eq!(dt("2025-01-04"), dt("2025-01-04 00:00:00"));
        assert_eq!(dt("04/01/2025 08:30"), dt("2025-01-04 08:30:00"));
        assert_eq!(dt("2025-01-04T08:30:00.250").date(), dt("2025-01-04").date());
        assert_eq!(dt("45661"), dt("2025-01-04"));
        assert!(parse_datetime_safe(Some("pendiente")).is_none());
        assert!(parse_datetime_safe(Some("  ")).is_none());
        assert!(parse_datetime_safe(None).is_none());
    }

    #[test]
    fn days_between_floors_partial_days() {
        assert_eq!(days_between(dt("2025-01-01"), dt("2025-01-04")), 3);
        assert_eq!(days_between(dt("2025-01-01 10:00"), dt("2025-01-02 09:00")), 0);
        assert_eq!(days_between(dt("2025-01-02 09:00"), dt("2025-01-02 08:00")), -1);
    }

    #[test]
    fn mode_breaks_ties_lexicographically() {
        assert_eq!(mode(["b", "a", "b", "a"]), Some("a".to_string()));
        assert_eq!(mode(["z", "b", "z"]), Some("z".to_string()));
        assert_eq!(mode(["", ""]), None);
    }

    #[test]
    fn flags_accept_spanish_yes() {
        assert!(parse_flag(Some("SI")));
        assert!(parse_flag(Some("Sí")));
        assert!(parse_flag(Some("1")));
        assert!(!parse_flag(Some("NO")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn formats_numbers_with_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-3.5, 1), "-3.5");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_pct(0.25), "25.0%");
        assert_eq!(format_opt(None, 2), "-");
    }

    #[test]
    fn folds_accents() {
        assert_eq!(fold_text("Atención Vendedor"), "atencion vendedor");
    }
}
