//! Tagged cell values and the coercions the engine applies to them.
//!
//! Spreadsheet cells hold text, numbers, or dates interchangeably. Every
//! coercion here is explicit and returns `Result<_, ParseFailure>`; callers
//! decide whether a failure becomes a null, a fallback, or a skip.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

/// A loosely typed spreadsheet value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Plain text rendering, used for header labels and text-keyed fields.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Timestamp(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Trimmed text form, or `Empty` when nothing is left after trimming.
    pub fn trimmed_text(&self) -> CellValue {
        let text = self.display();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }
}

/// Format a number the way a spreadsheet shows it in General format:
/// integers without decimals, everything else with the shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ---------------------------------------------------------------------------
// Parse failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailureKind {
    Timestamp,
    Amount,
}

impl fmt::Display for ParseFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp => write!(f, "timestamp"),
            Self::Amount => write!(f, "amount"),
        }
    }
}

/// A value that could not be coerced. Never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub kind: ParseFailureKind,
    pub input: String,
}

impl ParseFailure {
    fn new(kind: ParseFailureKind, input: impl Into<String>) -> Self {
        Self { kind, input: input.into() }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse {} from '{}'", self.kind, self.input)
    }
}

impl std::error::Error for ParseFailure {}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Datetime layouts tried in order. Slash dates are month-first, then day-first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d-%b-%Y %H:%M:%S%.f",
    "%d-%b-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%b-%Y"];

/// Serial 2958466 is 10000-01-01, one past the last date a spreadsheet can hold.
const MAX_SERIAL: f64 = 2_958_466.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Parse timestamp text. Offsets in RFC 3339 input are dropped (local wall time kept).
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, ParseFailure> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ParseFailure::new(ParseFailureKind::Timestamp, input));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }

    Err(ParseFailure::new(ParseFailureKind::Timestamp, input))
}

/// Drop sub-second precision.
pub fn truncate_to_seconds(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

fn serial_epoch(date1904: bool) -> Option<NaiveDateTime> {
    let date = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    date.and_hms_opt(0, 0, 0)
}

/// Convert a spreadsheet serial date to a datetime, rounded to the millisecond.
pub fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_SERIAL {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    serial_epoch(date1904)?.checked_add_signed(TimeDelta::milliseconds(millis))
}

/// Convert a datetime to a spreadsheet serial date.
pub fn datetime_to_serial(dt: NaiveDateTime, date1904: bool) -> Option<f64> {
    let delta = dt - serial_epoch(date1904)?;
    let serial = delta.num_milliseconds() as f64 / MILLIS_PER_DAY;
    (0.0..MAX_SERIAL).contains(&serial).then_some(serial)
}

/// Coerce any cell to a timestamp truncated to whole seconds.
///
/// Numbers are read as 1900-system serial dates.
pub fn coerce_timestamp(value: &CellValue) -> Result<NaiveDateTime, ParseFailure> {
    match value {
        CellValue::Timestamp(dt) => Ok(truncate_to_seconds(*dt)),
        CellValue::Text(s) => parse_timestamp(s).map(truncate_to_seconds),
        CellValue::Number(n) => serial_to_datetime(*n, false)
            .map(truncate_to_seconds)
            .ok_or_else(|| ParseFailure::new(ParseFailureKind::Timestamp, format_number(*n))),
        CellValue::Empty => Err(ParseFailure::new(ParseFailureKind::Timestamp, "")),
    }
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Strip separator/currency tokens and parse as a finite float.
pub fn parse_amount(input: &str, strip: &[String]) -> Result<f64, ParseFailure> {
    let mut cleaned = input.to_string();
    for token in strip {
        if !token.is_empty() {
            cleaned = cleaned.replace(token.as_str(), "");
        }
    }
    match cleaned.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(ParseFailure::new(ParseFailureKind::Amount, input)),
    }
}

pub fn coerce_amount(value: &CellValue, strip: &[String]) -> Result<f64, ParseFailure> {
    match value {
        CellValue::Number(n) if n.is_finite() => Ok(*n),
        CellValue::Text(s) => parse_amount(s, strip),
        other => Err(ParseFailure::new(ParseFailureKind::Amount, other.display())),
    }
}
