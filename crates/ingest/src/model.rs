use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::ValueKind;
use crate::header::normalize_header;
use crate::resolve::ColumnResolution;
use crate::value::CellValue;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A monthly sheet as read: header labels and the data rows below them.
/// Rows may be ragged; missing cells read as `Empty`.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Monthly data after header normalization: one canonical label per column,
/// empty columns already dropped.
#[derive(Debug, Clone, Default)]
pub struct MonthlyReport {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl MonthlyReport {
    /// 0-based index of the first column carrying `label` (normalized comparison).
    pub fn column_index(&self, label: &str) -> Option<usize> {
        let wanted = normalize_header(label);
        self.columns.iter().position(|c| normalize_header(c) == wanted)
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY)
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One monthly row accepted for the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct RowAppend {
    /// 1-based ledger row the cells land in.
    pub row: u32,
    /// 0-based index of the monthly data row it came from.
    pub monthly_row: usize,
    /// (1-based ledger column, value), sorted by column. Never empty.
    pub cells: Vec<(u32, CellValue)>,
}

/// Everything the write loop decided, before anything touches a file.
#[derive(Debug, Clone)]
pub struct IngestPlan {
    pub sheet: String,
    /// Last used data row before ingestion (1 = header only).
    pub last_row_before: u32,
    pub header_width: u32,
    pub rows_before: usize,
    pub resolution: ColumnResolution,
    pub appends: Vec<RowAppend>,
    pub duplicates_skipped: usize,
    pub blank_rows_skipped: usize,
    /// Dedupe fields present in the ledger header, as (ledger header, kind).
    pub dedupe_fields: Vec<(String, ValueKind)>,
}

impl IngestPlan {
    pub fn rows_added(&self) -> usize {
        self.appends.len()
    }

    pub fn last_row_after(&self) -> u32 {
        self.appends.last().map_or(self.last_row_before, |a| a.row)
    }

    /// No resolved columns: nothing can be written.
    pub fn is_write_free(&self) -> bool {
        self.resolution.resolved.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub master_backup: Option<PathBuf>,
    pub updated_master: PathBuf,
    pub sheet: String,
    pub rows_before: usize,
    pub rows_added: usize,
    pub rows_after: usize,
    pub dedupe_skipped: usize,
    pub blank_rows_skipped: usize,
    pub dates_normalized: usize,
    /// Formula cells in the date column that were left as formulas.
    pub date_formulas_skipped: usize,
    pub unmapped_monthly_columns: Vec<String>,
    pub unresolved_targets: BTreeMap<String, Vec<String>>,
    /// Canonical monthly field → ledger column letter.
    pub resolved_map: BTreeMap<String, String>,
    pub dry_run: bool,
    pub engine_version: String,
    /// RFC 3339 start of the run, as supplied by the caller.
    pub run_at: String,
}
