//! Monthly report reader (xlsx, xlsm, xls, xlsb, ods via calamine).

use std::path::Path;

use aprledger_ingest::config::MonthlyConfig;
use aprledger_ingest::value::parse_timestamp;
use aprledger_ingest::{CellValue, IngestError, RawTable};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use log::{debug, warn};

/// Read the configured sheet (or the first one) with headers taken from the
/// configured physical row. Columns are positioned from column A whatever
/// the used range says, so blank leading columns stay blank.
pub fn read_monthly(path: &Path, config: &MonthlyConfig) -> Result<RawTable, IngestError> {
    let read_err = |message: String| IngestError::MonthlyRead { path: path.to_path_buf(), message };

    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| read_err(format!("Failed to open workbook: {}", e)))?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let sheet_name = match &config.sheet {
        Some(name) if sheet_names.contains(name) => name.clone(),
        Some(name) => {
            return Err(IngestError::SheetNotFound {
                path: path.to_path_buf(),
                sheet: name.clone(),
                available: sheet_names,
            })
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| read_err("workbook contains no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| read_err(format!("Failed to read sheet '{}': {}", sheet_name, e)))?;

    let table = table_from_range(&range, config.header_row);
    debug!(
        "monthly sheet '{}': {} header(s), {} data row(s) below row {}",
        sheet_name,
        table.headers.len(),
        table.rows.len(),
        config.header_row + 1
    );
    Ok(table)
}

fn table_from_range(range: &Range<Data>, header_row: u32) -> RawTable {
    let Some((end_row, end_col)) = range.end() else {
        warn!("monthly sheet is empty");
        return RawTable::default();
    };
    if header_row > end_row {
        warn!("header row {} is below the last used row {}", header_row + 1, end_row + 1);
        return RawTable::default();
    }

    let cell = |row: u32, col: u32| range.get_value((row, col)).map(data_value).unwrap_or_default();

    let headers = (0..=end_col).map(|col| cell(header_row, col).display()).collect();
    let rows = (header_row + 1..=end_row)
        .map(|row| (0..=end_col).map(|col| cell(row, col)).collect())
        .collect();

    RawTable { headers, rows }
}

fn data_value(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => CellValue::Timestamp(value),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(CellValue::Timestamp)
            .unwrap_or_else(|_| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
