//! `xl/styles.xml`: date-format detection on read, and derived date styles
//! on write.
//!
//! Derived styles copy the source `<xf>` (font, fill, border, alignment) and
//! only swap the number format, so a re-typed date cell looks like its
//! neighbours apart from the date display.

use std::collections::HashMap;

use quick_xml::events::Event;

use crate::xml::{self, attr, escape, position, rewrite_tag, splice, Span};

/// Built-in number format ids that display dates or times.
fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Does a custom format code render a date or time?
///
/// Quoted literals, `[...]` sections, and escaped characters are ignored;
/// any remaining d/m/y/h/s token counts.
pub fn is_date_format_code(code: &str) -> bool {
    let mut chars = code.chars();
    let mut in_quote = false;
    let mut in_bracket = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quote = !in_quote,
            _ if in_quote => {}
            '[' => in_bracket = true,
            ']' => in_bracket = false,
            _ if in_bracket => {}
            '\\' | '_' | '*' => {
                chars.next();
            }
            'd' | 'D' | 'm' | 'M' | 'y' | 'Y' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

#[derive(Debug, Clone)]
struct Xf {
    num_fmt_id: u32,
    span: Span,
    tag: Span,
}

#[derive(Debug, Clone, Copy)]
enum Section {
    /// Start tag plus the offset of the closing tag.
    Open { tag: Span, end: usize },
    Empty(Span),
}

#[derive(Debug, Clone)]
pub struct StyleBook {
    xml: String,
    root_tag_end: usize,
    num_fmts: HashMap<u32, String>,
    num_fmts_section: Option<Section>,
    xfs: Vec<Xf>,
    cell_xfs_section: Option<Section>,
    added_num_fmt: Option<(u32, String)>,
    added_xfs: Vec<String>,
    derived: HashMap<u32, u32>,
}

impl StyleBook {
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = xml::reader(xml);
        let mut buf = Vec::new();

        let mut root_tag_end = None;
        let mut num_fmts = HashMap::new();
        let mut num_fmts_section = None;
        let mut xfs = Vec::new();
        let mut cell_xfs_section = None;
        let mut in_num_fmts = false;
        let mut in_cell_xfs = false;
        let mut open_xf: Option<Xf> = None;

        loop {
            let before = position(&reader);
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| format!("XML parse error in styles.xml: {}", e))?;
            let after = position(&reader);
            let span = Span::new(before, after);

            match event {
                Event::Start(ref e) => match e.name().as_ref() {
                    b"styleSheet" => root_tag_end = Some(after),
                    b"numFmts" => {
                        in_num_fmts = true;
                        num_fmts_section = Some(Section::Open { tag: span, end: 0 });
                    }
                    b"numFmt" if in_num_fmts => insert_num_fmt(&mut num_fmts, e),
                    b"cellXfs" => {
                        in_cell_xfs = true;
                        cell_xfs_section = Some(Section::Open { tag: span, end: 0 });
                    }
                    b"xf" if in_cell_xfs => {
                        open_xf = Some(Xf { num_fmt_id: num_fmt_id(e), span, tag: span });
                    }
                    _ => {}
                },
                Event::Empty(ref e) => match e.name().as_ref() {
                    b"numFmts" => num_fmts_section = Some(Section::Empty(span)),
                    b"numFmt" if in_num_fmts => insert_num_fmt(&mut num_fmts, e),
                    b"cellXfs" => cell_xfs_section = Some(Section::Empty(span)),
                    b"xf" if in_cell_xfs => xfs.push(Xf { num_fmt_id: num_fmt_id(e), span, tag: span }),
                    _ => {}
                },
                Event::End(ref e) => match e.name().as_ref() {
                    b"numFmts" => {
                        in_num_fmts = false;
                        if let Some(Section::Open { end, .. }) = num_fmts_section.as_mut() {
                            *end = before;
                        }
                    }
                    b"cellXfs" => {
                        in_cell_xfs = false;
                        if let Some(Section::Open { end, .. }) = cell_xfs_section.as_mut() {
                            *end = before;
                        }
                    }
                    b"xf" => {
                        if let Some(mut xf) = open_xf.take() {
                            xf.span.end = after;
                            xfs.push(xf);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            drop(event);
            buf.clear();
        }

        Ok(Self {
            xml: xml.to_string(),
            root_tag_end: root_tag_end.ok_or_else(|| "styles.xml has no <styleSheet>".to_string())?,
            num_fmts,
            num_fmts_section,
            xfs,
            cell_xfs_section,
            added_num_fmt: None,
            added_xfs: Vec::new(),
            derived: HashMap::new(),
        })
    }

    /// Does cell style `index` display numbers as dates?
    pub fn is_date_style(&self, index: u32) -> bool {
        let Some(xf) = self.xfs.get(index as usize) else {
            return false;
        };
        is_builtin_date_format(xf.num_fmt_id)
            || self
                .num_fmts
                .get(&xf.num_fmt_id)
                .is_some_and(|code| is_date_format_code(code))
    }

    /// Cell style that looks like `source` but displays `format_code`.
    /// Styles created here are reused for the rest of the run.
    pub fn date_style(&mut self, source: Option<u32>, format_code: &str) -> Result<u32, String> {
        if self.xfs.is_empty() {
            return Err("styles.xml has no cell formats".to_string());
        }
        let source = source.filter(|s| (*s as usize) < self.xfs.len()).unwrap_or(0);
        let fmt_id = self.num_fmt_for(format_code);

        if self.xfs[source as usize].num_fmt_id == fmt_id {
            return Ok(source);
        }
        if let Some(&index) = self.derived.get(&source) {
            return Ok(index);
        }

        let xf = &self.xfs[source as usize];
        let element = xf.span.slice(&self.xml);
        let tag = xf.tag.slice(&self.xml);
        let fmt = fmt_id.to_string();
        let new_tag = rewrite_tag(tag, &[("numFmtId", fmt.as_str()), ("applyNumberFormat", "1")], &[])?;
        let derived_xf = format!("{}{}", new_tag, &element[tag.len()..]);

        let index = (self.xfs.len() + self.added_xfs.len()) as u32;
        self.added_xfs.push(derived_xf);
        self.derived.insert(source, index);
        Ok(index)
    }

    fn num_fmt_for(&mut self, format_code: &str) -> u32 {
        if let Some((id, _)) = self.added_num_fmt.as_ref().filter(|(_, c)| c == format_code) {
            return *id;
        }
        if let Some((&id, _)) = self.num_fmts.iter().filter(|(_, c)| c.as_str() == format_code).min_by_key(|(id, _)| **id) {
            return id;
        }
        let id = self.num_fmts.keys().copied().max().unwrap_or(163).max(163) + 1;
        self.added_num_fmt = Some((id, format_code.to_string()));
        id
    }

    pub fn is_modified(&self) -> bool {
        !self.added_xfs.is_empty() || self.added_num_fmt.is_some()
    }

    /// The styles part with every addition spliced in.
    pub fn render(&self) -> Result<String, String> {
        let mut edits = Vec::new();

        if let Some((id, code)) = &self.added_num_fmt {
            let entry = format!(r#"<numFmt numFmtId="{}" formatCode="{}"/>"#, id, escape(code));
            let count = (self.num_fmts.len() + 1).to_string();
            match self.num_fmts_section {
                Some(Section::Open { tag, end }) => {
                    let tag_xml = rewrite_tag(tag.slice(&self.xml), &[("count", count.as_str())], &[])?;
                    edits.push((tag, tag_xml));
                    edits.push((Span::at(end), entry));
                }
                Some(Section::Empty(span)) => {
                    edits.push((span, format!(r#"<numFmts count="1">{}</numFmts>"#, entry)));
                }
                None => {
                    // numFmts is the first child of styleSheet
                    edits.push((Span::at(self.root_tag_end), format!(r#"<numFmts count="1">{}</numFmts>"#, entry)));
                }
            }
        }

        if !self.added_xfs.is_empty() {
            let count = (self.xfs.len() + self.added_xfs.len()).to_string();
            let added = self.added_xfs.concat();
            match self.cell_xfs_section {
                Some(Section::Open { tag, end }) => {
                    let tag_xml = rewrite_tag(tag.slice(&self.xml), &[("count", count.as_str())], &[])?;
                    edits.push((tag, tag_xml));
                    edits.push((Span::at(end), added));
                }
                Some(Section::Empty(span)) => {
                    edits.push((span, format!(r#"<cellXfs count="{}">{}</cellXfs>"#, count, added)));
                }
                None => return Err("styles.xml has no <cellXfs>".to_string()),
            }
        }

        splice(&self.xml, edits)
    }
}

fn insert_num_fmt(map: &mut HashMap<u32, String>, e: &quick_xml::events::BytesStart<'_>) {
    let id = attr(e, b"numFmtId").and_then(|s| s.parse().ok());
    if let (Some(id), Some(code)) = (id, attr(e, b"formatCode")) {
        map.insert(id, code);
    }
}

fn num_fmt_id(e: &quick_xml::events::BytesStart<'_>) -> u32 {
    attr(e, b"numFmtId").and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="&quot;$&quot;#,##0.00"/></numFmts><fonts count="2"><font><sz val="11"/></font><font><b/><sz val="11"/></font></fonts><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="1" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"><alignment horizontal="center"/></xf></cellXfs></styleSheet>"#;

    #[test]
    fn date_format_codes() {
        assert!(is_date_format_code("yyyy-mm-dd hh:mm:ss"));
        assert!(is_date_format_code("[$-409]d-mmm-yy;@"));
        assert!(!is_date_format_code("\"$\"#,##0.00"));
        assert!(!is_date_format_code("General"));
        assert!(!is_date_format_code("0.00_);[Red](0.00)"));
        assert!(!is_date_format_code("\"days\" 0"));
    }

    #[test]
    fn detect_date_styles() {
        let book = StyleBook::parse(STYLES).unwrap();
        assert!(!book.is_date_style(0));
        assert!(!book.is_date_style(1));
        assert!(book.is_date_style(2));
        assert!(!book.is_date_style(9));
    }

    #[test]
    fn derived_style_keeps_font_and_children() {
        let mut book = StyleBook::parse(STYLES).unwrap();

        let bold = book.date_style(Some(1), "yyyy-mm-dd hh:mm:ss").unwrap();
        let centered = book.date_style(Some(2), "yyyy-mm-dd hh:mm:ss").unwrap();
        let again = book.date_style(Some(1), "yyyy-mm-dd hh:mm:ss").unwrap();
        let plain = book.date_style(None, "yyyy-mm-dd hh:mm:ss").unwrap();

        assert_eq!((bold, centered, again, plain), (3, 4, 3, 5));
        assert!(book.is_modified());

        let xml = book.render().unwrap();
        assert!(xml.contains(r#"<numFmts count="2">"#));
        assert!(xml.contains(r#"<numFmt numFmtId="165" formatCode="yyyy-mm-dd hh:mm:ss"/></numFmts>"#));
        assert!(xml.contains(r#"<cellXfs count="6">"#));
        assert!(xml.contains(
            r#"<xf numFmtId="165" fontId="1" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#
        ));
        assert!(xml.contains(
            r#"<xf numFmtId="165" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"><alignment horizontal="center"/></xf>"#
        ));

        let reparsed = StyleBook::parse(&xml).unwrap();
        assert!(reparsed.is_date_style(3));
        assert!(reparsed.is_date_style(5));
    }

    #[test]
    fn num_fmts_section_is_created_when_missing() {
        let xml = r#"<styleSheet><cellXfs count="1"><xf numFmtId="0"/></cellXfs></styleSheet>"#;
        let mut book = StyleBook::parse(xml).unwrap();
        assert_eq!(book.date_style(Some(0), "yyyy-mm-dd hh:mm:ss").unwrap(), 1);
        assert_eq!(
            book.render().unwrap(),
            r#"<styleSheet><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd hh:mm:ss"/></numFmts><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="164" applyNumberFormat="1"/></cellXfs></styleSheet>"#
        );
    }

    #[test]
    fn existing_date_format_is_reused() {
        let xml = r#"<styleSheet><numFmts count="1"><numFmt numFmtId="170" formatCode="yyyy-mm-dd hh:mm:ss"/></numFmts><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="170"/></cellXfs></styleSheet>"#;
        let mut book = StyleBook::parse(xml).unwrap();
        assert_eq!(book.date_style(Some(1), "yyyy-mm-dd hh:mm:ss").unwrap(), 1);
        assert!(!book.is_modified());
        assert_eq!(book.date_style(Some(0), "yyyy-mm-dd hh:mm:ss").unwrap(), 2);
        assert!(book.render().unwrap().contains(r#"<xf numFmtId="170" applyNumberFormat="1"/>"#));
    }
}
