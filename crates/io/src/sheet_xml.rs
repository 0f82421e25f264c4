//! Worksheet XML index: where each row, cell, and structural element sits in
//! the part text, so the patcher can splice without re-serializing the sheet.

use aprledger_ingest::range::{parse_cell_ref, CellRange};
use quick_xml::events::{BytesStart, Event};

use crate::shared_strings::TextRuns;
use crate::xml::{self, attr, position, unescape, Span};

#[derive(Debug, Clone, PartialEq)]
pub struct CellEntry {
    pub row: u32,
    pub col: u32,
    /// Whole `<c>…</c>` (or `<c/>`) element.
    pub span: Span,
    /// Opening `<c …>` tag alone.
    pub tag: Span,
    pub style: Option<u32>,
    pub cell_type: Option<String>,
    /// Unescaped `<v>` text.
    pub value: Option<String>,
    /// Text of an `<is>` inline string.
    pub inline: Option<String>,
    pub has_formula: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowEntry {
    pub number: u32,
    pub span: Span,
    pub tag: Span,
    pub self_closing: bool,
    pub cells: Vec<CellEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetData {
    /// `<sheetData>…</sheetData>`; `end` is the offset of the closing tag.
    Open { end: usize },
    /// `<sheetData/>`
    Empty(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeTag {
    pub tag: Span,
    pub range: Option<CellRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetIndex {
    pub dimension: Option<RangeTag>,
    pub sheet_data: SheetData,
    pub rows: Vec<RowEntry>,
    pub auto_filter: Option<RangeTag>,
    /// `r:id`s of `<tablePart>` elements.
    pub table_parts: Vec<String>,
}

impl SheetIndex {
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = xml::reader(xml);
        let mut buf = Vec::new();

        let mut dimension = None;
        let mut sheet_data = None;
        let mut rows: Vec<RowEntry> = Vec::new();
        let mut auto_filter = None;
        let mut table_parts = Vec::new();

        let mut row: Option<RowEntry> = None;
        let mut cell: Option<CellEntry> = None;
        let mut value_start: Option<usize> = None;
        let mut inline: Option<TextRuns> = None;
        let mut last_row = 0u32;
        let mut last_col = 0u32;

        loop {
            let before = position(&reader);
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| format!("XML parse error in worksheet at byte {}: {}", before, e))?;
            let after = position(&reader);
            let span = Span::new(before, after);

            match event {
                Event::Start(ref e) => match e.name().as_ref() {
                    b"row" => {
                        let number = row_number(e, last_row);
                        last_row = number;
                        last_col = 0;
                        row = Some(RowEntry { number, span, tag: span, self_closing: false, cells: Vec::new() });
                    }
                    b"c" => {
                        let entry = cell_entry(e, span, last_row, last_col);
                        last_col = entry.col;
                        cell = Some(entry);
                    }
                    b"f" if cell.is_some() => mark_formula(&mut cell),
                    b"v" if cell.is_some() => value_start = Some(after),
                    b"is" if cell.is_some() => inline = Some(TextRuns::default()),
                    b"sheetData" => {}
                    b"autoFilter" => auto_filter = Some(range_tag(e, span)),
                    name => {
                        if let Some(runs) = inline.as_mut() {
                            runs.open(name, after);
                        }
                    }
                },
                Event::Empty(ref e) => match e.name().as_ref() {
                    b"row" => {
                        let number = row_number(e, last_row);
                        last_row = number;
                        last_col = 0;
                        rows.push(RowEntry { number, span, tag: span, self_closing: true, cells: Vec::new() });
                    }
                    b"c" => {
                        let entry = cell_entry(e, span, last_row, last_col);
                        last_col = entry.col;
                        if let Some(r) = row.as_mut() {
                            r.cells.push(entry);
                        }
                    }
                    b"f" if cell.is_some() => mark_formula(&mut cell),
                    b"sheetData" => sheet_data = Some(SheetData::Empty(span)),
                    b"dimension" => dimension = Some(range_tag(e, span)),
                    b"autoFilter" => auto_filter = Some(range_tag(e, span)),
                    b"tablePart" => {
                        if let Some(rid) = attr(e, b"r:id") {
                            table_parts.push(rid);
                        }
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.name().as_ref() {
                    b"v" => {
                        if let (Some(start), Some(c)) = (value_start.take(), cell.as_mut()) {
                            c.value = Some(unescape(xml.get(start..before).unwrap_or("")));
                        }
                    }
                    b"is" => {
                        if let (Some(mut runs), Some(c)) = (inline.take(), cell.as_mut()) {
                            c.inline = Some(runs.finish());
                        }
                    }
                    b"c" => {
                        if let Some(mut c) = cell.take() {
                            c.span.end = after;
                            if let Some(r) = row.as_mut() {
                                r.cells.push(c);
                            }
                        }
                    }
                    b"row" => {
                        if let Some(mut r) = row.take() {
                            r.span.end = after;
                            rows.push(r);
                        }
                    }
                    b"sheetData" => sheet_data = Some(SheetData::Open { end: before }),
                    name => {
                        if let Some(runs) = inline.as_mut() {
                            runs.close(name, xml, before);
                        }
                    }
                },
                Event::Eof => break,
                _ => {}
            }
            drop(event);
            buf.clear();
        }

        let sheet_data = sheet_data.ok_or_else(|| "worksheet has no <sheetData>".to_string())?;
        Ok(Self { dimension, sheet_data, rows, auto_filter, table_parts })
    }

    pub fn row(&self, number: u32) -> Option<&RowEntry> {
        self.rows
            .binary_search_by_key(&number, |r| r.number)
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&CellEntry> {
        self.row(row)?.cells.iter().find(|c| c.col == col)
    }
}

fn row_number(e: &BytesStart<'_>, last_row: u32) -> u32 {
    attr(e, b"r")
        .and_then(|r| r.trim().parse().ok())
        .unwrap_or(last_row + 1)
}

fn cell_entry(e: &BytesStart<'_>, span: Span, row: u32, last_col: u32) -> CellEntry {
    let (row, col) = attr(e, b"r")
        .and_then(|r| parse_cell_ref(&r))
        .unwrap_or((row, last_col + 1));
    CellEntry {
        row,
        col,
        span,
        tag: span,
        style: attr(e, b"s").and_then(|s| s.parse().ok()),
        cell_type: attr(e, b"t"),
        value: None,
        inline: None,
        has_formula: false,
    }
}

fn mark_formula(cell: &mut Option<CellEntry>) {
    if let Some(c) = cell.as_mut() {
        c.has_formula = true;
    }
}

fn range_tag(e: &BytesStart<'_>, span: Span) -> RangeTag {
    RangeTag {
        tag: span,
        range: attr(e, b"ref").and_then(|r| CellRange::parse(&r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1:C3"/><sheetData><row r="1" spans="1:3"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Purchase &amp; Date</t></is></c><c r="C1" s="2"/></row><row r="3"><c r="A3"><v>42.5</v></c><c r="B3" s="4"><f>A3*2</f><v>85</v></c></row></sheetData><autoFilter ref="A1:C3"/><tableParts count="1"><tablePart r:id="rId1"/></tableParts></worksheet>"#;

    #[test]
    fn index_rows_cells_and_structure() {
        let index = SheetIndex::parse(SHEET).unwrap();

        assert_eq!(index.rows.len(), 2);
        assert_eq!(index.rows[0].number, 1);
        assert_eq!(index.rows[1].number, 3);
        assert_eq!(index.dimension.as_ref().unwrap().range.unwrap().to_string(), "A1:C3");
        assert_eq!(index.auto_filter.as_ref().unwrap().tag.slice(SHEET), r#"<autoFilter ref="A1:C3"/>"#);
        assert_eq!(index.table_parts, vec!["rId1"]);

        let a1 = index.cell(1, 1).unwrap();
        assert_eq!(a1.cell_type.as_deref(), Some("s"));
        assert_eq!(a1.value.as_deref(), Some("0"));

        let b1 = index.cell(1, 2).unwrap();
        assert_eq!(b1.inline.as_deref(), Some("Purchase & Date"));
        assert_eq!(b1.span.slice(SHEET), r#"<c r="B1" t="inlineStr"><is><t>Purchase &amp; Date</t></is></c>"#);

        let c1 = index.cell(1, 3).unwrap();
        assert_eq!(c1.style, Some(2));
        assert_eq!(c1.value, None);

        let b3 = index.cell(3, 2).unwrap();
        assert!(b3.has_formula);
        assert_eq!(b3.value.as_deref(), Some("85"));
        assert_eq!(b3.tag.slice(SHEET), r#"<c r="B3" s="4">"#);

        match index.sheet_data {
            SheetData::Open { end } => assert!(SHEET[end..].starts_with("</sheetData>")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(index.rows[1].span.slice(SHEET).starts_with(r#"<row r="3">"#));
        assert!(index.rows[1].span.slice(SHEET).ends_with("</row>"));
    }

    #[test]
    fn empty_sheet_data() {
        let xml = r#"<worksheet><dimension ref="A1"/><sheetData/></worksheet>"#;
        let index = SheetIndex::parse(xml).unwrap();
        assert!(index.rows.is_empty());
        assert_eq!(index.sheet_data, SheetData::Empty(Span::new(32, 44)));
    }

    #[test]
    fn missing_references_count_on() {
        let xml = r#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row><row><c t="b"><v>1</v></c></row></sheetData></worksheet>"#;
        let index = SheetIndex::parse(xml).unwrap();
        assert_eq!(index.rows[1].number, 2);
        assert_eq!(index.cell(1, 2).unwrap().value.as_deref(), Some("2"));
        assert_eq!(index.cell(2, 1).unwrap().cell_type.as_deref(), Some("b"));
    }
}
