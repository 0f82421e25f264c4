//! Small quick-xml helpers shared by the package readers and patchers.
//!
//! Parts are patched as text: readers record byte spans of the elements
//! they care about, and writers splice replacements into those spans. Bytes
//! outside the spans are never touched.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use quick_xml::Writer;

/// Byte range `[start, end)` into a part's XML text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn at(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn slice<'a>(&self, xml: &'a str) -> &'a str {
        xml.get(self.start..self.end).unwrap_or("")
    }
}

/// Reader over a part with whitespace preserved, so byte positions stay exact.
pub fn reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    reader
}

pub fn position(reader: &Reader<&[u8]>) -> usize {
    reader.buffer_position() as usize
}

/// Decode entity and character references; malformed input comes back as-is.
pub fn unescape(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Escape element text. Quotes are left alone; they only matter in attributes.
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::partial_escape(text)
}

/// Unescaped value of attribute `key` (qualified name, e.g. `r:id`).
pub fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape(&String::from_utf8_lossy(&a.value)))
}

/// Edit attributes on a single start or empty tag given as text.
///
/// Attributes named in `set` are replaced (or appended when missing), those in
/// `remove` dropped. Every other attribute keeps its original raw value.
pub fn rewrite_tag(tag_xml: &str, set: &[(&str, &str)], remove: &[&str]) -> Result<String, String> {
    let mut reader = reader(tag_xml);
    let mut buf = Vec::new();

    loop {
        let (tag, empty) = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e.into_owned(), false),
            Ok(Event::Empty(e)) => (e.into_owned(), true),
            Ok(Event::Eof) => return Err(format!("no element in '{}'", tag_xml)),
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {
                buf.clear();
                continue;
            }
        };

        let mut out = tag.clone();
        out.clear_attributes();
        let mut pending: Vec<(&str, &str)> = set.to_vec();
        for attr in tag.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if remove.contains(&key.as_str()) {
                continue;
            }
            if let Some(pos) = pending.iter().position(|(k, _)| *k == key) {
                let (k, v) = pending.remove(pos);
                out.push_attribute((k, v));
            } else {
                out.push_attribute(attr);
            }
        }
        for (k, v) in pending {
            out.push_attribute((k, v));
        }

        let mut writer = Writer::new(Vec::new());
        let event = if empty { Event::Empty(out) } else { Event::Start(out) };
        writer
            .write_event(event)
            .map_err(|e| format!("XML write error: {}", e))?;
        return String::from_utf8(writer.into_inner()).map_err(|e| e.to_string());
    }
}

/// Apply non-overlapping span replacements. Insertions (`start == end`) at
/// the same position keep their given order.
pub fn splice(xml: &str, mut edits: Vec<(Span, String)>) -> Result<String, String> {
    edits.sort_by_key(|(span, _)| (span.start, span.end));
    let mut out = String::with_capacity(xml.len() + edits.iter().map(|(_, s)| s.len()).sum::<usize>());
    let mut cursor = 0;
    for (span, text) in edits {
        if span.start < cursor || span.end < span.start || span.end > xml.len() {
            return Err(format!("overlapping XML edit at byte {}", span.start));
        }
        out.push_str(&xml[cursor..span.start]);
        out.push_str(&text);
        cursor = span.end;
    }
    out.push_str(&xml[cursor..]);
    Ok(out)
}
