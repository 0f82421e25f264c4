//! A1 references and post-append range maintenance.
//!
//! After rows are appended, the sheet's filter and any row-1 tables are
//! stretched to the new last row, and the date column is re-typed so the
//! ledger sorts and filters on real dates.

use std::fmt;

use chrono::NaiveDateTime;
use log::debug;

use crate::config::IngestConfig;
use crate::ledger::LedgerView;
use crate::value::{parse_timestamp, serial_to_datetime, truncate_to_seconds, CellValue};

// ---------------------------------------------------------------------------
// A1 references
// ---------------------------------------------------------------------------

/// 1-based column number → letters (1 → "A", 27 → "AA").
pub fn column_letters(col: u32) -> String {
    let mut n = col;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Letters → 1-based column number.
pub fn column_from_letters(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col = 0u32;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    Some(col)
}

/// "B7" / "$B$7" → (row, col), both 1-based.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let cell_ref = cell_ref.trim().replace('$', "");
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let col = column_from_letters(&cell_ref[..split])?;
    let row: u32 = cell_ref[split..].parse().ok()?;
    (row > 0).then_some((row, col))
}

/// A rectangular A1 range, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    /// Parses "A1:F20" or a single cell "A1".
    pub fn parse(s: &str) -> Option<Self> {
        let (start, end) = match s.split_once(':') {
            Some((a, b)) => (a, b),
            None => (s, s),
        };
        let (start_row, start_col) = parse_cell_ref(start)?;
        let (end_row, end_col) = parse_cell_ref(end)?;
        Some(Self { start_row, start_col, end_row, end_col })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_letters(self.start_col),
            self.start_row,
            column_letters(self.end_col),
            self.end_row
        )
    }
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TableRange {
    /// Opaque identifier chosen by the reader (the table part path).
    pub id: String,
    pub range: CellRange,
}

/// Structured ranges found on the ledger sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetRanges {
    pub auto_filter: Option<CellRange>,
    pub tables: Vec<TableRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateFixKind {
    /// Text that parsed; replace it with this datetime.
    Rewrite(NaiveDateTime),
    /// A number that is already a valid serial date; only the style changes.
    Restyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateFix {
    pub row: u32,
    pub col: u32,
    pub kind: DateFixKind,
}

/// Edits the writer applies after the row appends.
#[derive(Debug, Clone, Default)]
pub struct RangeEdits {
    pub last_row: u32,
    pub last_col: u32,
    pub auto_filter: Option<CellRange>,
    /// New ranges for tables anchored at row 1. Other tables are absent.
    pub tables: Vec<TableRange>,
    pub date_fixes: Vec<DateFix>,
}

/// Compute range and date edits from the post-append view.
pub fn maintain(after: &LedgerView, ranges: &SheetRanges, config: &IngestConfig) -> RangeEdits {
    let last_row = after.last_used_row();
    let last_col = after.header_width().max(1);

    let auto_filter = ranges.auto_filter.map(|current| CellRange {
        start_row: 1,
        start_col: current.start_col,
        end_row: last_row,
        end_col: last_col.max(current.start_col),
    });

    let tables = ranges
        .tables
        .iter()
        .filter(|t| t.range.start_row == 1)
        .map(|t| TableRange {
            id: t.id.clone(),
            range: CellRange {
                end_row: last_row.max(t.range.start_row + 1),
                ..t.range
            },
        })
        .collect();

    RangeEdits {
        last_row,
        last_col,
        auto_filter,
        tables,
        date_fixes: date_fixes(after, &config.date_column, last_row),
    }
}

fn date_fixes(view: &LedgerView, header: &str, last_row: u32) -> Vec<DateFix> {
    let Some(col) = view.header_index().find(header) else {
        debug!("date column '{header}' not in ledger header, skipping re-type");
        return Vec::new();
    };

    let mut fixes = Vec::new();
    for row in 2..=last_row {
        let kind = match view.get(row, col) {
            CellValue::Text(s) => match parse_timestamp(s) {
                Ok(dt) => DateFixKind::Rewrite(truncate_to_seconds(dt)),
                Err(e) => {
                    debug!("row {row}: {e}, left as text");
                    continue;
                }
            },
            CellValue::Number(n) if serial_to_datetime(*n, false).is_some() => DateFixKind::Restyle,
            _ => continue,
        };
        fixes.push(DateFix { row, col, kind });
    }
    fixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn column_letters_round_trip_edges() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(702), "ZZ");
        assert_eq!(column_letters(703), "AAA");
        assert_eq!(column_from_letters("aa"), Some(27));
        assert_eq!(column_from_letters("XFD"), Some(16384));
        assert_eq!(column_from_letters("A1"), None);
    }

    #[test]
    fn parse_refs_and_ranges() {
        assert_eq!(parse_cell_ref("$C$12"), Some((12, 3)));
        assert_eq!(parse_cell_ref("C0"), None);
        assert_eq!(parse_cell_ref("12"), None);

        let r = CellRange::parse("B1:AB40").unwrap();
        assert_eq!((r.start_row, r.start_col, r.end_row, r.end_col), (1, 2, 40, 28));
        assert_eq!(r.to_string(), "B1:AB40");
        assert_eq!(CellRange::parse("D4").unwrap().to_string(), "D4:D4");
    }

    fn ledger() -> LedgerView {
        let mut view = LedgerView::new("APR Bundle");
        for (i, h) in ["MSISDN", "Purchase Date", "PURCHASE_AMT"].iter().enumerate() {
            view.set(1, i as u32 + 1, CellValue::Text(h.to_string()));
        }
        for row in 2..=6 {
            view.set(row, 1, CellValue::Text(format!("278{row}")));
        }
        view
    }

    #[test]
    fn filter_and_row_one_tables_follow_last_row() {
        let view = ledger();
        let ranges = SheetRanges {
            auto_filter: CellRange::parse("A1:B3"),
            tables: vec![
                TableRange { id: "xl/tables/table1.xml".into(), range: CellRange::parse("A1:C3").unwrap() },
                TableRange { id: "xl/tables/table2.xml".into(), range: CellRange::parse("F5:G9").unwrap() },
            ],
        };

        let edits = maintain(&view, &ranges, &IngestConfig::default());

        assert_eq!(edits.last_row, 6);
        assert_eq!(edits.last_col, 3);
        assert_eq!(edits.auto_filter.unwrap().to_string(), "A1:C6");
        assert_eq!(edits.tables.len(), 1);
        assert_eq!(edits.tables[0].id, "xl/tables/table1.xml");
        assert_eq!(edits.tables[0].range.to_string(), "A1:C6");
    }

    #[test]
    fn table_keeps_its_columns() {
        let view = ledger();
        let ranges = SheetRanges {
            auto_filter: None,
            tables: vec![TableRange { id: "t".into(), range: CellRange::parse("B1:B2").unwrap() }],
        };
        let edits = maintain(&view, &ranges, &IngestConfig::default());
        assert!(edits.auto_filter.is_none());
        assert_eq!(edits.tables[0].range.to_string(), "B1:B6");
    }

    #[test]
    fn header_only_table_keeps_a_data_row() {
        let mut view = LedgerView::new("APR Bundle");
        view.set(1, 1, CellValue::Text("MSISDN".into()));
        let ranges = SheetRanges {
            auto_filter: None,
            tables: vec![TableRange { id: "t".into(), range: CellRange::parse("A1:A2").unwrap() }],
        };
        let edits = maintain(&view, &ranges, &IngestConfig::default());
        assert_eq!(edits.tables[0].range.to_string(), "A1:A2");
    }

    #[test]
    fn date_column_is_retyped() {
        let mut view = ledger();
        let when = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(9, 30, 15).unwrap();
        view.set(2, 2, CellValue::Text("2024-03-05 09:30:15.900".into()));
        view.set(3, 2, CellValue::Text("pending".into()));
        view.set(4, 2, CellValue::Number(45356.5));
        view.set(5, 2, CellValue::Timestamp(when));
        view.set(6, 2, CellValue::Number(-3.0));

        let edits = maintain(&view, &SheetRanges::default(), &IngestConfig::default());

        assert_eq!(
            edits.date_fixes,
            vec![
                DateFix { row: 2, col: 2, kind: DateFixKind::Rewrite(when) },
                DateFix { row: 4, col: 2, kind: DateFixKind::Restyle },
            ]
        );
    }
}
