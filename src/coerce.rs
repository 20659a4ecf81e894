//! Parse-or-default coercion
//!
//! Rows from the store (and spreadsheet imports before them) carry numbers as
//! numbers, as formatted strings (`"1,250.00 $"`), or not at all. Everything
//! is read through this module so the fallback is explicit: a `Coerced<T>`
//! says whether a value was parsed, absent, or present but unreadable, and
//! the caller decides the default.

use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

/// Spreadsheet serial dates count days from this epoch
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Largest serial accepted (9999-12-31)
const MAX_SERIAL: i64 = 2_958_465;

/// Numbers beyond this magnitude are read as unreadable, keeping every
/// later product and sum inside `Decimal` range
const MAX_MAGNITUDE: Decimal = Decimal::from_parts(276_447_232, 23_283, 0, false, 0);

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Outcome of a lenient parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coerced<T> {
    /// Parsed successfully
    Value(T),
    /// Absent, null, blank or a placeholder such as `-`
    Missing,
    /// Present but unreadable; carries the raw text
    Invalid(String),
}

impl<T> Coerced<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn or(self, fallback: T) -> T {
        self.value().unwrap_or(fallback)
    }

    /// True when a caller-supplied default will be used
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Coerced::Value(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Coerced<U> {
        match self {
            Coerced::Value(v) => Coerced::Value(f(v)),
            Coerced::Missing => Coerced::Missing,
            Coerced::Invalid(raw) => Coerced::Invalid(raw),
        }
    }
}

impl<T: Default> Coerced<T> {
    pub fn or_default(self) -> T {
        self.value().unwrap_or_default()
    }
}

// =============================================================================
// NUMBERS
// =============================================================================

/// Read a JSON value as a decimal
pub fn number(value: Option<&Value>) -> Coerced<Decimal> {
    match value {
        None | Some(Value::Null) => Coerced::Missing,
        Some(Value::Number(n)) => {
            let text = n.to_string();
            match parse_decimal(&text) {
                Some(d) => within_range(d, text),
                None => Coerced::Invalid(text),
            }
        }
        Some(Value::String(s)) => parse_number(s),
        Some(other) => Coerced::Invalid(other.to_string()),
    }
}

/// Parse a formatted number: thousands separators, spaces, currency and
/// percent signs are dropped before parsing
pub fn parse_number(raw: &str) -> Coerced<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '$' | '€' | '%'))
        .collect();

    if cleaned.is_empty() || cleaned == "-" {
        return Coerced::Missing;
    }

    match parse_decimal(&cleaned) {
        Some(d) => within_range(d, raw.to_string()),
        None => Coerced::Invalid(raw.to_string()),
    }
}

fn within_range(value: Decimal, raw: String) -> Coerced<Decimal> {
    if value.abs() > MAX_MAGNITUDE {
        Coerced::Invalid(raw)
    } else {
        Coerced::Value(value)
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

// =============================================================================
// DATES
// =============================================================================

/// Read a JSON value as a calendar date
pub fn date(value: Option<&Value>) -> Coerced<NaiveDate> {
    match value {
        None | Some(Value::Null) => Coerced::Missing,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(serial) => from_serial(serial.trunc() as i64)
                .map(Coerced::Value)
                .unwrap_or_else(|| Coerced::Invalid(n.to_string())),
            None => Coerced::Invalid(n.to_string()),
        },
        Some(Value::String(s)) => parse_date(s),
        Some(other) => Coerced::Invalid(other.to_string()),
    }
}

/// Parse a date in any of the accepted layouts, an ISO timestamp (the time
/// part is dropped) or a spreadsheet serial number
pub fn parse_date(raw: &str) -> Coerced<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return Coerced::Missing;
    }

    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, format) {
            return Coerced::Value(d);
        }
    }

    if let Some(ts) = parse_timestamp(value) {
        return Coerced::Value(ts.date_naive());
    }

    if let Ok(serial) = value.parse::<i64>() {
        if let Some(d) = from_serial(serial) {
            return Coerced::Value(d);
        }
    }

    Coerced::Invalid(raw.to_string())
}

fn from_serial(serial: i64) -> Option<NaiveDate> {
    if !(1..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial as u64))
}

/// Read a JSON value as a UTC timestamp (`created_at` style columns)
pub fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value {
        Some(Value::String(s)) => parse_timestamp(s.trim()).or_else(|| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    // Postgres renders timestamptz as `2024-01-15 10:00:00+00`
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .map(|dt| dt.and_utc())
}

// =============================================================================
// TEXT
// =============================================================================

/// Read a JSON value as trimmed, non-empty text; numbers are rendered
pub fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
