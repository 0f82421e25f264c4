//! OPC package access: reading parts, following relationships, and writing
//! a package back with only selected parts replaced.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::xml::{self, attr};

pub fn open_archive(path: &Path) -> Result<ZipArchive<File>, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    ZipArchive::new(file).map_err(|e| format!("Failed to read as ZIP: {}", e))
}

/// Read a part as UTF-8 text.
pub fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("Part '{}' not found in package: {}", path, e))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

    Ok(content)
}

/// Like [`read_zip_file`], but a missing part is `None`.
pub fn read_optional<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Option<String>, String> {
    if archive.index_for_name(path).is_none() {
        return Ok(None);
    }
    read_zip_file(archive, path).map(Some)
}

// ---------------------------------------------------------------------------
// Workbook sheets and relationships
// ---------------------------------------------------------------------------

/// A `<sheet>` entry of `xl/workbook.xml`, in workbook order.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetEntry {
    pub name: String,
    pub rid: String,
}

pub fn sheet_entries(workbook_xml: &str) -> Result<Vec<SheetEntry>, String> {
    let mut reader = xml::reader(workbook_xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rid)) = (attr(e, b"name"), attr(e, b"r:id")) {
                    sheets.push(SheetEntry { name, rid });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error in workbook.xml: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// `<workbookPr date1904="1">` switches serial dates to the 1904 epoch.
pub fn uses_1904_dates(workbook_xml: &str) -> bool {
    let mut reader = xml::reader(workbook_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"workbookPr" => {
                return matches!(attr(e, b"date1904").as_deref(), Some("1") | Some("true"));
            }
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
        buf.clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

pub fn relationships(rels_xml: &str) -> Result<Vec<Relationship>, String> {
    let mut reader = xml::reader(rels_xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
                    rels.push(Relationship {
                        id,
                        rel_type: attr(e, b"Type").unwrap_or_default(),
                        target,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error in relationships: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Relationships part for `part` (`xl/worksheets/sheet1.xml` →
/// `xl/worksheets/_rels/sheet1.xml.rels`).
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the directory of its source part.
/// Absolute targets (`/xl/...`) are taken from the package root.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Worksheet part for a sheet name, plus the sheet's 0-based position in the
/// workbook. `Ok(None)` when no sheet has that name.
pub fn find_worksheet<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    workbook_xml: &str,
    sheet_name: &str,
) -> Result<Option<(String, usize)>, String> {
    let sheets = sheet_entries(workbook_xml)?;
    let Some(position) = sheets.iter().position(|s| s.name == sheet_name) else {
        return Ok(None);
    };

    let rels_xml = read_zip_file(archive, "xl/_rels/workbook.xml.rels")?;
    let rid = &sheets[position].rid;
    let target = relationships(&rels_xml)?
        .into_iter()
        .find(|r| &r.id == rid)
        .map(|r| r.target)
        .ok_or_else(|| format!("Relationship '{}' not found", rid))?;

    Ok(Some((resolve_target("xl/workbook.xml", &target), position)))
}

// ---------------------------------------------------------------------------
// Write-back
// ---------------------------------------------------------------------------

/// Write `source` to `dest` with the parts in `replacements` swapped in.
/// Every other entry is copied raw, without recompressing. The new package is
/// written next to `dest` and renamed over it.
pub fn write_package(source: &Path, dest: &Path, replacements: &BTreeMap<String, Vec<u8>>) -> Result<(), String> {
    let mut archive = open_archive(source)?;
    let temp = temp_path(dest);

    let result = (|| -> Result<(), String> {
        let out = File::create(&temp).map_err(|e| format!("Failed to create {}: {}", temp.display(), e))?;
        let mut writer = ZipWriter::new(out);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| format!("Failed to read entry {}: {}", i, e))?;
            let name = entry.name().to_string();
            match replacements.get(&name) {
                Some(bytes) => {
                    drop(entry);
                    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                    writer
                        .start_file(name.as_str(), options)
                        .map_err(|e| format!("Failed to write '{}': {}", name, e))?;
                    writer
                        .write_all(bytes)
                        .map_err(|e| format!("Failed to write '{}': {}", name, e))?;
                }
                None => {
                    writer
                        .raw_copy_file(entry)
                        .map_err(|e| format!("Failed to copy '{}': {}", name, e))?;
                }
            }
        }

        let out = writer.finish().map_err(|e| format!("Failed to finish package: {}", e))?;
        out.sync_all().map_err(|e| format!("Failed to flush package: {}", e))?;
        Ok(())
    })();
    drop(archive);

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    std::fs::rename(&temp, dest).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        format!("Failed to replace {}: {}", dest.display(), e)
    })
}

fn temp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_string());
    dest.with_file_name(format!(".{}.saving", name))
}
