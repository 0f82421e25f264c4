use quick_xml::events::Event;

use crate::xml::{self, position, unescape};

/// Collects the visible text of a string item (`<si>` or `<is>`): plain
/// `<t>` and rich-text runs, with phonetic hints (`<rPh>`) left out.
#[derive(Debug, Default)]
pub(crate) struct TextRuns {
    phonetic: bool,
    start: Option<usize>,
    text: String,
}

impl TextRuns {
    pub(crate) fn open(&mut self, name: &[u8], after: usize) {
        match name {
            b"rPh" => self.phonetic = true,
            b"t" if !self.phonetic => self.start = Some(after),
            _ => {}
        }
    }

    pub(crate) fn close(&mut self, name: &[u8], xml: &str, before: usize) {
        match name {
            b"rPh" => self.phonetic = false,
            b"t" => {
                if let Some(start) = self.start.take() {
                    self.text.push_str(&unescape(xml.get(start..before).unwrap_or("")));
                }
            }
            _ => {}
        }
    }

    pub(crate) fn finish(&mut self) -> String {
        self.phonetic = false;
        self.start = None;
        std::mem::take(&mut self.text)
    }
}

/// Parse `xl/sharedStrings.xml` into its string table, indexed as `t="s"` cells
/// reference it.
pub fn parse_shared_strings(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = xml::reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut runs: Option<TextRuns> = None;

    loop {
        let before = position(&reader);
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let after = position(&reader);
                if e.name().as_ref() == b"si" {
                    runs = Some(TextRuns::default());
                } else if let Some(r) = runs.as_mut() {
                    r.open(e.name().as_ref(), after);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"si" {
                    if let Some(mut r) = runs.take() {
                        strings.push(r.finish());
                    }
                } else if let Some(r) = runs.as_mut() {
                    r.close(e.name().as_ref(), xml, before);
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error in sharedStrings.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rich_and_phonetic_items() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
<si><t>MSISDN</t></si>
<si><r><rPr><b/></rPr><t>Bundle </t></r><r><t xml:space="preserve">A &amp; B</t></r></si>
<si><t>漢字</t><rPh sb="0" eb="2"><t>カンジ</t></rPh></si>
<si><t/></si>
</sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["MSISDN", "Bundle A & B", "漢字", ""]);
    }

    #[test]
    fn whitespace_is_preserved() {
        let xml = r#"<sst><si><t xml:space="preserve">  padded  </t></si></sst>"#;
        assert_eq!(parse_shared_strings(xml).unwrap(), vec!["  padded  "]);
    }
}
