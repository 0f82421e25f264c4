use std::collections::BTreeMap;

use crate::model::RowAppend;
use crate::resolve::HeaderIndex;
use crate::value::CellValue;

/// Read-only snapshot of the ledger sheet. Rows and columns are 1-based;
/// row 1 is the header.
#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    sheet: String,
    rows: BTreeMap<u32, BTreeMap<u32, CellValue>>,
    max_column: u32,
}

impl LedgerView {
    pub fn new(sheet: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            ..Self::default()
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Store a cell. `Empty` clears it.
    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        if row == 0 || col == 0 {
            return;
        }
        if value.is_empty() {
            if let Some(cells) = self.rows.get_mut(&row) {
                cells.remove(&col);
            }
            return;
        }
        self.max_column = self.max_column.max(col);
        self.rows.entry(row).or_default().insert(col, value);
    }

    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows.get(&row).and_then(|r| r.get(&col)).unwrap_or(&EMPTY)
    }

    /// Highest column holding any value, 0 for an empty sheet.
    pub fn max_column(&self) -> u32 {
        self.max_column
    }

    /// Header cells as (column, text), blanks skipped.
    pub fn headers(&self) -> Vec<(u32, String)> {
        self.rows
            .get(&1)
            .map(|cells| {
                cells
                    .iter()
                    .map(|(col, v)| (*col, v.display()))
                    .filter(|(_, text)| !text.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn header_index(&self) -> HeaderIndex {
        let headers = self.headers();
        HeaderIndex::new(headers.iter().map(|(col, text)| (*col, text.as_str())))
    }

    /// Rightmost non-blank header column; the sheet's widest column when the
    /// header row is blank.
    pub fn header_width(&self) -> u32 {
        self.headers()
            .last()
            .map(|(col, _)| *col)
            .unwrap_or(self.max_column)
    }

    /// Last row (≥2) with any value in columns 1..=header width; 1 when the
    /// sheet holds only its header.
    pub fn last_used_row(&self) -> u32 {
        let width = self.header_width();
        self.rows
            .range(2..)
            .rev()
            .find(|(_, cells)| cells.range(1..=width.max(1)).any(|(_, v)| !v.is_empty()))
            .map_or(1, |(row, _)| *row)
    }

    /// Data rows counted from row 2 to the last used row, gaps included.
    pub fn data_row_count(&self) -> usize {
        self.last_used_row().saturating_sub(1) as usize
    }

    /// Copy with the planned cells applied.
    pub fn with_appends(&self, appends: &[RowAppend]) -> LedgerView {
        let mut next = self.clone();
        for append in appends {
            for (col, value) in &append.cells {
                next.set(append.row, *col, value.clone());
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.into())
    }

    fn sample() -> LedgerView {
        let mut view = LedgerView::new("APR Bundle");
        view.set(1, 1, text("MSISDN"));
        view.set(1, 2, text("STAT"));
        view.set(2, 1, text("2783"));
        view.set(4, 2, text("ACTIVE"));
        // Outside the header width; ignored by the last-row scan
        view.set(9, 5, text("note"));
        view
    }

    #[test]
    fn last_used_row_respects_header_width() {
        let view = sample();
        assert_eq!(view.header_width(), 2);
        assert_eq!(view.max_column(), 5);
        assert_eq!(view.last_used_row(), 4);
        assert_eq!(view.data_row_count(), 3);
    }

    #[test]
    fn header_only_sheet() {
        let mut view = LedgerView::new("APR Bundle");
        view.set(1, 1, text("MSISDN"));
        assert_eq!(view.last_used_row(), 1);
        assert_eq!(view.data_row_count(), 0);
        assert_eq!(view.get(2, 1), &CellValue::Empty);
    }

    #[test]
    fn blank_header_falls_back_to_widest_column() {
        let mut view = LedgerView::new("APR Bundle");
        view.set(1, 1, text("  "));
        view.set(3, 3, CellValue::Number(1.0));
        assert_eq!(view.header_width(), 3);
        assert_eq!(view.last_used_row(), 3);
    }

    #[test]
    fn appends_extend_the_view() {
        let view = sample();
        let after = view.with_appends(&[RowAppend {
            row: 5,
            monthly_row: 0,
            cells: vec![(1, text("2784")), (2, text("ACTIVE"))],
        }]);
        assert_eq!(after.last_used_row(), 5);
        assert_eq!(after.get(5, 1), &text("2784"));
        // Original is untouched
        assert_eq!(view.last_used_row(), 4);
    }
}
