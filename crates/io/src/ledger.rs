//! The ledger workbook: read the target sheet into a [`LedgerView`], then
//! write an [`IngestPlan`] and its [`RangeEdits`] back in one pass.
//!
//! Only the worksheet, its row-1 tables, `workbook.xml` (filter database
//! name) and `styles.xml` are rewritten. Every other part of the package,
//! macros included, is copied byte-for-byte.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aprledger_ingest::range::{column_letters, CellRange, DateFixKind, RangeEdits, SheetRanges, TableRange};
use aprledger_ingest::value::{datetime_to_serial, parse_timestamp, serial_to_datetime};
use aprledger_ingest::{CellValue, IngestError, IngestPlan, LedgerView};
use log::{debug, warn};
use quick_xml::events::Event;

use crate::package::{
    find_worksheet, open_archive, read_optional, read_zip_file, relationships, rels_path_for, resolve_target,
    sheet_entries, uses_1904_dates, write_package,
};
use crate::shared_strings::parse_shared_strings;
use crate::sheet_xml::{CellEntry, SheetData, SheetIndex};
use crate::styles::StyleBook;
use crate::xml::{self, attr, escape, position, rewrite_tag, splice, Span};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

#[derive(Debug, Clone)]
struct TablePart {
    part: String,
    xml: String,
    tag: Span,
    range: CellRange,
    auto_filter: Option<Span>,
    totals_rows: u32,
}

/// What a save changed, beyond the planned rows.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    /// Date-column cells re-typed or restyled.
    pub dates_normalized: usize,
    /// Formula cells in the date column left alone.
    pub formula_cells_skipped: usize,
    pub parts_rewritten: Vec<String>,
}

#[derive(Debug)]
pub struct LedgerWorkbook {
    path: PathBuf,
    sheet: String,
    sheet_position: usize,
    sheet_part: String,
    date1904: bool,
    workbook_xml: String,
    sheet_xml: String,
    index: SheetIndex,
    styles_part: Option<String>,
    styles: Option<StyleBook>,
    tables: Vec<TablePart>,
    view: LedgerView,
}

impl LedgerWorkbook {
    pub fn open(path: &Path, sheet: &str) -> Result<Self, IngestError> {
        let read_err = |message: String| IngestError::LedgerRead { path: path.to_path_buf(), message };

        let mut archive = open_archive(path).map_err(read_err)?;
        let workbook_xml = read_zip_file(&mut archive, WORKBOOK_PART).map_err(read_err)?;

        let Some((sheet_part, sheet_position)) = find_worksheet(&mut archive, &workbook_xml, sheet).map_err(read_err)?
        else {
            let available = sheet_entries(&workbook_xml)
                .map(|sheets| sheets.into_iter().map(|s| s.name).collect())
                .unwrap_or_default();
            return Err(IngestError::SheetNotFound {
                path: path.to_path_buf(),
                sheet: sheet.to_string(),
                available,
            });
        };

        let workbook_rels = relationships(&read_zip_file(&mut archive, WORKBOOK_RELS).map_err(read_err)?)
            .map_err(read_err)?;
        let part_of_type = |suffix: &str| {
            workbook_rels
                .iter()
                .find(|r| r.rel_type.ends_with(suffix))
                .map(|r| resolve_target(WORKBOOK_PART, &r.target))
        };

        let shared_strings = match part_of_type("/sharedStrings") {
            Some(part) => match read_optional(&mut archive, &part).map_err(read_err)? {
                Some(xml) => parse_shared_strings(&xml).map_err(read_err)?,
                None => Vec::new(),
            },
            None => Vec::new(),
        };

        let styles_part = part_of_type("/styles");
        let styles = match &styles_part {
            Some(part) => match read_optional(&mut archive, part).map_err(read_err)? {
                Some(xml) => Some(StyleBook::parse(&xml).map_err(read_err)?),
                None => None,
            },
            None => None,
        };

        let sheet_xml = read_zip_file(&mut archive, &sheet_part).map_err(read_err)?;
        let index = SheetIndex::parse(&sheet_xml).map_err(read_err)?;
        let date1904 = uses_1904_dates(&workbook_xml);

        let mut tables = Vec::new();
        if !index.table_parts.is_empty() {
            let rels_part = rels_path_for(&sheet_part);
            let sheet_rels = match read_optional(&mut archive, &rels_part).map_err(read_err)? {
                Some(xml) => relationships(&xml).map_err(read_err)?,
                None => Vec::new(),
            };
            for rid in &index.table_parts {
                let Some(rel) = sheet_rels.iter().find(|r| &r.id == rid) else {
                    warn!("table relationship '{}' missing from {}", rid, rels_part);
                    continue;
                };
                let part = resolve_target(&sheet_part, &rel.target);
                let xml = read_zip_file(&mut archive, &part).map_err(read_err)?;
                match parse_table(part.clone(), xml).map_err(read_err)? {
                    Some(table) => tables.push(table),
                    None => warn!("table part {} has no usable ref, left untouched", part),
                }
            }
        }

        let mut view = LedgerView::new(sheet);
        for row in &index.rows {
            for cell in &row.cells {
                view.set(cell.row, cell.col, cell_value(cell, &shared_strings, styles.as_ref(), date1904));
            }
        }
        debug!(
            "opened '{}' ({}): {} row element(s), {} table(s)",
            sheet,
            sheet_part,
            index.rows.len(),
            tables.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            sheet_position,
            sheet_part,
            date1904,
            workbook_xml,
            sheet_xml,
            index,
            styles_part,
            styles,
            tables,
            view,
        })
    }

    pub fn view(&self) -> &LedgerView {
        &self.view
    }

    pub fn sheet_part(&self) -> &str {
        &self.sheet_part
    }

    pub fn uses_1904_dates(&self) -> bool {
        self.date1904
    }

    /// The sheet's filter and table ranges as they are now.
    pub fn ranges(&self) -> SheetRanges {
        SheetRanges {
            auto_filter: self.index.auto_filter.as_ref().and_then(|f| f.range),
            tables: self
                .tables
                .iter()
                .map(|t| TableRange { id: t.part.clone(), range: t.range })
                .collect(),
        }
    }

    /// Remove date fixes that land on formula cells and return how many were
    /// dropped. Formulas keep their `<f>` whatever their cached value is.
    pub fn drop_formula_date_fixes(&self, edits: &mut RangeEdits) -> usize {
        let before = edits.date_fixes.len();
        edits.date_fixes.retain(|fix| {
            let formula = self.holds_formula(fix.row, fix.col);
            if formula {
                warn!("{}{} holds a formula, not re-typed", column_letters(fix.col), fix.row);
            }
            !formula
        });
        before - edits.date_fixes.len()
    }

    fn holds_formula(&self, row: u32, col: u32) -> bool {
        self.index.cell(row, col).is_some_and(|c| c.has_formula)
    }

    /// Apply the plan and range edits and write the package to `dest`.
    pub fn save(&self, plan: &IngestPlan, edits: &RangeEdits, date_format: &str, dest: &Path) -> Result<SaveReport, IngestError> {
        let save_err = |message: String| IngestError::Save { path: dest.to_path_buf(), message };

        let mut report = SaveReport::default();
        let mut styles = self.styles.clone();
        let mut replacements: BTreeMap<String, Vec<u8>> = BTreeMap::new();

        let writes = self.collect_writes(plan, edits, &mut report);
        let sheet_xml = self
            .patch_sheet(&writes, edits, &mut styles, date_format)
            .map_err(save_err)?;
        replacements.insert(self.sheet_part.clone(), sheet_xml.into_bytes());

        for edit in &edits.tables {
            let Some(table) = self.tables.iter().find(|t| t.part == edit.id) else {
                continue;
            };
            if table.totals_rows > 0 {
                warn!("table {} has a totals row, range left at {}", table.part, table.range);
                continue;
            }
            if edit.range == table.range {
                continue;
            }
            let xml = patch_table(table, edit.range).map_err(save_err)?;
            replacements.insert(table.part.clone(), xml.into_bytes());
        }

        if let Some(filter) = edits.auto_filter.filter(|_| self.index.auto_filter.is_some()) {
            if let Some(xml) = self.patch_filter_database(filter).map_err(save_err)? {
                replacements.insert(WORKBOOK_PART.to_string(), xml.into_bytes());
            }
        }

        if let (Some(book), Some(part)) = (styles.as_ref(), self.styles_part.as_ref()) {
            if book.is_modified() {
                replacements.insert(part.clone(), book.render().map_err(save_err)?.into_bytes());
            }
        }

        report.parts_rewritten = replacements.keys().cloned().collect();
        write_package(&self.path, dest, &replacements).map_err(save_err)?;
        Ok(report)
    }

    /// Planned values plus date fixes, keyed by row then column.
    fn collect_writes(&self, plan: &IngestPlan, edits: &RangeEdits, report: &mut SaveReport) -> BTreeMap<u32, BTreeMap<u32, CellWrite>> {
        let mut writes: BTreeMap<u32, BTreeMap<u32, CellWrite>> = BTreeMap::new();

        for append in &plan.appends {
            let row = writes.entry(append.row).or_default();
            for (col, value) in &append.cells {
                row.insert(*col, CellWrite { value: Some(value.clone()), date_style: false });
            }
        }

        for fix in &edits.date_fixes {
            if self.holds_formula(fix.row, fix.col) {
                report.formula_cells_skipped += 1;
                continue;
            }
            let entry = writes.entry(fix.row).or_default().entry(fix.col).or_default();
            match &fix.kind {
                DateFixKind::Rewrite(dt) => entry.value = Some(CellValue::Timestamp(*dt)),
                DateFixKind::Restyle => entry.date_style = true,
            }
            report.dates_normalized += 1;
        }

        writes
    }

    fn patch_sheet(
        &self,
        writes: &BTreeMap<u32, BTreeMap<u32, CellWrite>>,
        edits: &RangeEdits,
        styles: &mut Option<StyleBook>,
        date_format: &str,
    ) -> Result<String, String> {
        let xml = &self.sheet_xml;
        let mut out: Vec<(Span, String)> = Vec::new();
        let mut cells = CellRenderer { styles, date_format, date1904: self.date1904 };
        let mut widest = 0;

        for (&row_no, row_writes) in writes {
            widest = widest.max(row_writes.keys().next_back().copied().unwrap_or(0));
            match self.index.row(row_no) {
                Some(existing) => {
                    let mut tag = rewrite_tag(existing.tag.slice(xml), &[], &["spans"])?;
                    if existing.self_closing {
                        tag = open_tag(&tag);
                    }
                    let mut body = String::new();
                    let mut pending = row_writes.iter().peekable();
                    for cell in &existing.cells {
                        while let Some((&col, write)) = pending.next_if(|&(&col, _)| col < cell.col) {
                            body.push_str(&cells.render(row_no, col, write, None)?);
                        }
                        match pending.next_if(|&(&col, _)| col == cell.col) {
                            Some((_, write)) => body.push_str(&cells.rewrite(xml, cell, write)?),
                            None => body.push_str(cell.span.slice(xml)),
                        }
                    }
                    for (&col, write) in pending {
                        body.push_str(&cells.render(row_no, col, write, None)?);
                    }
                    out.push((existing.span, format!("{}{}</row>", tag, body)));
                }
                None => {
                    let mut text = format!(r#"<row r="{}">"#, row_no);
                    for (&col, write) in row_writes {
                        text.push_str(&cells.render(row_no, col, write, None)?);
                    }
                    text.push_str("</row>");
                    let at = self
                        .index
                        .rows
                        .iter()
                        .find(|r| r.number > row_no)
                        .map(|r| r.span.start);
                    out.push((Span::at(at.unwrap_or_else(|| self.sheet_data_end())), text));
                }
            }
        }

        if let SheetData::Empty(span) = self.index.sheet_data {
            let rows: String = out.drain(..).map(|(_, text)| text).collect();
            out.push((span, format!("<sheetData>{}</sheetData>", rows)));
        }

        if let Some(dimension) = &self.index.dimension {
            let current = dimension.range.unwrap_or(CellRange { start_row: 1, start_col: 1, end_row: 1, end_col: 1 });
            let wanted = CellRange {
                start_row: current.start_row.min(1),
                start_col: current.start_col.min(1),
                end_row: current.end_row.max(edits.last_row),
                end_col: current.end_col.max(edits.last_col).max(widest),
            };
            if wanted != current {
                let value = wanted.to_string();
                out.push((dimension.tag, rewrite_tag(dimension.tag.slice(xml), &[("ref", value.as_str())], &[])?));
            }
        }

        if let (Some(tag), Some(range)) = (&self.index.auto_filter, edits.auto_filter) {
            let value = range.to_string();
            out.push((tag.tag, rewrite_tag(tag.tag.slice(xml), &[("ref", value.as_str())], &[])?));
        }

        splice(xml, out)
    }

    fn sheet_data_end(&self) -> usize {
        match self.index.sheet_data {
            SheetData::Open { end } => end,
            SheetData::Empty(span) => span.start,
        }
    }

    /// Point the sheet's hidden `_xlnm._FilterDatabase` name at the new filter range.
    fn patch_filter_database(&self, range: CellRange) -> Result<Option<String>, String> {
        let Some(span) = filter_database_span(&self.workbook_xml, self.sheet_position)? else {
            return Ok(None);
        };
        let reference = format!(
            "'{}'!${}${}:${}${}",
            self.sheet.replace('\'', "''"),
            column_letters(range.start_col),
            range.start_row,
            column_letters(range.end_col),
            range.end_row
        );
        if xml::unescape(span.slice(&self.workbook_xml)) == reference {
            return Ok(None);
        }
        splice(&self.workbook_xml, vec![(span, escape(&reference).into_owned())]).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

fn cell_value(cell: &CellEntry, shared: &[String], styles: Option<&StyleBook>, date1904: bool) -> CellValue {
    let text = |s: &str| {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    };
    let raw = cell.value.as_deref().unwrap_or("");

    match cell.cell_type.as_deref() {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .map_or(CellValue::Empty, |s| text(s)),
        Some("inlineStr") => text(cell.inline.as_deref().unwrap_or(raw)),
        Some("str") => text(raw),
        Some("b") => match raw.trim() {
            "1" | "true" => CellValue::Text("TRUE".into()),
            "0" | "false" => CellValue::Text("FALSE".into()),
            _ => CellValue::Empty,
        },
        Some("e") => CellValue::Empty,
        Some("d") => parse_timestamp(raw).map(CellValue::Timestamp).unwrap_or_else(|_| text(raw)),
        _ => match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => {
                let is_date = cell
                    .style
                    .zip(styles)
                    .is_some_and(|(s, book)| book.is_date_style(s));
                match serial_to_datetime(n, date1904).filter(|_| is_date) {
                    Some(dt) => CellValue::Timestamp(dt),
                    None => CellValue::Number(n),
                }
            }
            _ => text(raw),
        },
    }
}

/// What happens to one cell: a new value, a date style, or both.
#[derive(Debug, Clone, Default)]
struct CellWrite {
    /// `None` keeps the existing value.
    value: Option<CellValue>,
    date_style: bool,
}

struct CellRenderer<'a> {
    styles: &'a mut Option<StyleBook>,
    date_format: &'a str,
    date1904: bool,
}

impl CellRenderer<'_> {
    fn date_style(&mut self, source: Option<u32>) -> Result<Option<u32>, String> {
        match self.styles.as_mut() {
            Some(book) => book.date_style(source, self.date_format).map(Some),
            None => Ok(source),
        }
    }

    /// A fresh `<c>` element.
    fn render(&mut self, row: u32, col: u32, write: &CellWrite, style: Option<u32>) -> Result<String, String> {
        let r = format!("{}{}", column_letters(col), row);
        let value = write.value.clone().unwrap_or_default();

        let serial = match &value {
            CellValue::Timestamp(dt) => datetime_to_serial(*dt, self.date1904),
            _ => None,
        };
        let style = if serial.is_some() || write.date_style {
            self.date_style(style)?
        } else {
            style
        };
        let s = style.map(|s| format!(r#" s="{}""#, s)).unwrap_or_default();

        Ok(match (&value, serial) {
            (_, Some(serial)) => format!(r#"<c r="{}"{}><v>{}</v></c>"#, r, s, serial),
            (CellValue::Number(n), _) => format!(r#"<c r="{}"{}><v>{}</v></c>"#, r, s, n),
            (CellValue::Empty, _) => format!(r#"<c r="{}"{}/>"#, r, s),
            (other, _) => {
                let text = other.display();
                let space = if text.trim() != text { r#" xml:space="preserve""# } else { "" };
                format!(r#"<c r="{}"{} t="inlineStr"><is><t{}>{}</t></is></c>"#, r, s, space, escape(&text))
            }
        })
    }

    /// Replace or restyle an existing `<c>` element.
    fn rewrite(&mut self, xml: &str, cell: &CellEntry, write: &CellWrite) -> Result<String, String> {
        if write.value.is_some() {
            return self.render(cell.row, cell.col, write, cell.style);
        }
        // Restyle only: keep the element, swap its style
        let style = self.date_style(cell.style)?;
        let Some(style) = style.filter(|s| Some(*s) != cell.style) else {
            return Ok(cell.span.slice(xml).to_string());
        };
        let tag = cell.tag.slice(xml);
        let value = style.to_string();
        let new_tag = rewrite_tag(tag, &[("s", value.as_str())], &[])?;
        Ok(format!("{}{}", new_tag, &cell.span.slice(xml)[tag.len()..]))
    }
}

/// `<row …/>` → `<row …>`
fn open_tag(tag: &str) -> String {
    match tag.strip_suffix("/>") {
        Some(head) => format!("{}>", head.trim_end()),
        None => tag.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tables and defined names
// ---------------------------------------------------------------------------

fn parse_table(part: String, xml: String) -> Result<Option<TablePart>, String> {
    let mut reader = xml::reader(&xml);
    let mut buf = Vec::new();
    let mut table: Option<(Span, Option<CellRange>, u32)> = None;
    let mut auto_filter = None;
    let mut depth = 0usize;

    loop {
        let before = position(&reader);
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("XML parse error in {}: {}", part, e))?;
        let span = Span::new(before, position(&reader));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                match e.name().as_ref() {
                    b"table" if table.is_none() => {
                        let range = attr(e, b"ref").and_then(|r| CellRange::parse(&r));
                        let totals = attr(e, b"totalsRowCount").and_then(|c| c.parse().ok()).unwrap_or(0);
                        table = Some((span, range, totals));
                    }
                    // Only the table's own filter, not one nested in a column definition
                    b"autoFilter" if depth == 1 => auto_filter = Some(span),
                    _ => {}
                }
                if is_start {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
        drop(event);
        buf.clear();
    }

    Ok(match table {
        Some((tag, Some(range), totals_rows)) => Some(TablePart { part, xml, tag, range, auto_filter, totals_rows }),
        _ => None,
    })
}

fn patch_table(table: &TablePart, range: CellRange) -> Result<String, String> {
    let value = range.to_string();
    let mut edits = vec![(table.tag, rewrite_tag(table.tag.slice(&table.xml), &[("ref", value.as_str())], &[])?)];
    if let Some(filter) = table.auto_filter {
        edits.push((filter, rewrite_tag(filter.slice(&table.xml), &[("ref", value.as_str())], &[])?));
    }
    splice(&table.xml, edits)
}

/// Text span of `<definedName name="_xlnm._FilterDatabase" localSheetId="N">`.
fn filter_database_span(workbook_xml: &str, sheet_position: usize) -> Result<Option<Span>, String> {
    let mut reader = xml::reader(workbook_xml);
    let mut buf = Vec::new();
    let mut text_start = None;
    let local_id = sheet_position.to_string();

    loop {
        let before = position(&reader);
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"definedName" => {
                let is_filter = attr(e, b"name").as_deref() == Some("_xlnm._FilterDatabase")
                    && attr(e, b"localSheetId").as_deref() == Some(local_id.as_str());
                if is_filter {
                    text_start = Some(position(&reader));
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"definedName" => {
                if let Some(start) = text_start.take() {
                    return Ok(Some(Span::new(start, before)));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(format!("XML parse error in workbook.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cell_type: Option<&str>, value: Option<&str>, style: Option<u32>) -> CellEntry {
        CellEntry {
            row: 2,
            col: 1,
            span: Span::new(0, 0),
            tag: Span::new(0, 0),
            style,
            cell_type: cell_type.map(String::from),
            value: value.map(String::from),
            inline: None,
            has_formula: false,
        }
    }

    #[test]
    fn cell_values_by_type() {
        let shared = vec!["MSISDN".to_string(), String::new()];
        assert_eq!(cell_value(&entry(Some("s"), Some("0"), None), &shared, None, false), CellValue::Text("MSISDN".into()));
        assert_eq!(cell_value(&entry(Some("s"), Some("1"), None), &shared, None, false), CellValue::Empty);
        assert_eq!(cell_value(&entry(Some("s"), Some("9"), None), &shared, None, false), CellValue::Empty);
        assert_eq!(cell_value(&entry(Some("b"), Some("1"), None), &shared, None, false), CellValue::Text("TRUE".into()));
        assert_eq!(cell_value(&entry(Some("e"), Some("#N/A"), None), &shared, None, false), CellValue::Empty);
        assert_eq!(cell_value(&entry(None, Some("12.5"), None), &shared, None, false), CellValue::Number(12.5));
        assert_eq!(cell_value(&entry(None, None, Some(3)), &shared, None, false), CellValue::Empty);
    }

    #[test]
    fn date_styled_numbers_become_timestamps() {
        let styles = StyleBook::parse(
            r#"<styleSheet><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="22"/></cellXfs></styleSheet>"#,
        )
        .unwrap();
        let dated = cell_value(&entry(None, Some("45000.5"), Some(1)), &[], Some(&styles), false);
        assert_eq!(dated.display(), "2023-03-15 12:00:00");
        let plain = cell_value(&entry(None, Some("45000.5"), Some(0)), &[], Some(&styles), false);
        assert_eq!(plain, CellValue::Number(45000.5));
    }

    #[test]
    fn open_tag_from_self_closing_row() {
        assert_eq!(open_tag(r#"<row r="4" ht="15"/>"#), r#"<row r="4" ht="15">"#);
        assert_eq!(open_tag(r#"<row r="4">"#), r#"<row r="4">"#);
    }

    #[test]
    fn table_ref_and_inner_filter_follow() {
        let xml = r#"<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" id="1" name="Table1" displayName="Table1" ref="A1:C4"><autoFilter ref="A1:C4"/><tableColumns count="3"><tableColumn id="1" name="MSISDN"/><tableColumn id="2" name="STAT"/><tableColumn id="3" name="Purchase Date"/></tableColumns></table>"#;
        let table = parse_table("xl/tables/table1.xml".into(), xml.into()).unwrap().unwrap();
        assert_eq!(table.range.to_string(), "A1:C4");
        assert_eq!(table.totals_rows, 0);

        let patched = patch_table(&table, CellRange::parse("A1:C9").unwrap()).unwrap();
        assert!(patched.contains(r#"displayName="Table1" ref="A1:C9">"#));
        assert!(patched.contains(r#"<autoFilter ref="A1:C9"/>"#));
    }

    #[test]
    fn filter_database_name_for_sheet_position() {
        let xml = r#"<workbook><definedNames><definedName name="_xlnm._FilterDatabase" localSheetId="0" hidden="1">Summary!$A$1:$B$2</definedName><definedName name="_xlnm._FilterDatabase" localSheetId="1" hidden="1">'APR Bundle'!$A$1:$C$4</definedName></definedNames></workbook>"#;
        let span = filter_database_span(xml, 1).unwrap().unwrap();
        assert_eq!(span.slice(xml), "'APR Bundle'!$A$1:$C$4");
        assert!(filter_database_span(xml, 2).unwrap().is_none());
    }
}
