//! Identity keys for duplicate detection.
//!
//! A key is a fixed-arity tuple over the dedupe fields present in the ledger
//! header. The ledger path and the monthly path go through the same
//! `normalize_part`, so the same logical record yields the same key on both
//! sides.

use chrono::NaiveDateTime;
use log::debug;
use ordered_float::OrderedFloat;

use crate::config::{IngestConfig, ValueKind};
use crate::ledger::LedgerView;
use crate::model::MonthlyReport;
use crate::resolve::HeaderIndex;
use crate::value::{coerce_amount, coerce_timestamp, CellValue};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    /// Missing or unparseable. Equal to every other `Null`.
    Null,
    Text(String),
    Number(OrderedFloat<f64>),
    Timestamp(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(pub Vec<KeyPart>);

/// Normalize one field value for keying.
pub fn normalize_part(kind: ValueKind, value: &CellValue, strip: &[String]) -> KeyPart {
    match kind {
        ValueKind::Timestamp => match coerce_timestamp(value) {
            Ok(dt) => KeyPart::Timestamp(dt),
            Err(e) => {
                if !value.is_empty() {
                    debug!("key: {e}, using null");
                }
                KeyPart::Null
            }
        },
        ValueKind::Amount => match coerce_amount(value, strip) {
            Ok(n) => KeyPart::Number(OrderedFloat(n)),
            Err(_) => text_part(value),
        },
        ValueKind::Text | ValueKind::Raw => text_part(value),
    }
}

fn text_part(value: &CellValue) -> KeyPart {
    match value.trimmed_text() {
        CellValue::Text(s) => KeyPart::Text(s),
        _ => KeyPart::Null,
    }
}

#[derive(Debug, Clone)]
struct KeyField {
    ledger_header: String,
    ledger_column: u32,
    monthly: String,
    kind: ValueKind,
}

/// Builds keys for ledger rows and monthly rows over the same field list.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    fields: Vec<KeyField>,
    monthly_columns: Vec<Option<usize>>,
    strip: Vec<String>,
}

impl KeyBuilder {
    /// Only dedupe fields whose ledger header exists take part.
    pub fn new(config: &IngestConfig, headers: &HeaderIndex, report: &MonthlyReport) -> Self {
        let fields: Vec<KeyField> = config
            .dedupe
            .iter()
            .filter_map(|f| {
                headers.find(&f.ledger).map(|col| KeyField {
                    ledger_header: f.ledger.clone(),
                    ledger_column: col,
                    monthly: f.monthly.clone(),
                    kind: f.kind,
                })
            })
            .collect();
        let monthly_columns = fields.iter().map(|f| report.column_index(&f.monthly)).collect();
        Self {
            fields,
            monthly_columns,
            strip: config.amount_strip.clone(),
        }
    }

    /// False when no dedupe field is present in the ledger; every key is `None` then.
    pub fn is_enabled(&self) -> bool {
        !self.fields.is_empty()
    }

    /// (ledger header, kind) for each participating field.
    pub fn fields(&self) -> Vec<(String, ValueKind)> {
        self.fields.iter().map(|f| (f.ledger_header.clone(), f.kind)).collect()
    }

    pub fn ledger_key(&self, view: &LedgerView, row: u32) -> Option<IdentityKey> {
        if !self.is_enabled() {
            return None;
        }
        Some(IdentityKey(
            self.fields
                .iter()
                .map(|f| normalize_part(f.kind, view.get(row, f.ledger_column), &self.strip))
                .collect(),
        ))
    }

    pub fn monthly_key(&self, report: &MonthlyReport, row: usize) -> Option<IdentityKey> {
        if !self.is_enabled() {
            return None;
        }
        Some(IdentityKey(
            self.fields
                .iter()
                .zip(&self.monthly_columns)
                .map(|(f, idx)| match idx {
                    Some(col) => normalize_part(f.kind, report.value(row, *col), &self.strip),
                    None => KeyPart::Null,
                })
                .collect(),
        ))
    }
}
