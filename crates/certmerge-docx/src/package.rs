//! DOCX package I/O.
//!
//! A `.docx` file is a ZIP archive. The text-bearing parts
//! (`word/document.xml` and the `word/headerN.xml` / `word/footerN.xml`
//! family) are parsed into owned XML trees for mutation; every other entry
//! is carried as raw bytes and written back verbatim, so styles, images,
//! numbering, and relationships survive untouched. Parts whose tree was
//! never marked dirty are also written from their original bytes.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use certmerge_core::{CertMergeError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::xml::XmlPart;

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";

/// One entry of the package.
#[derive(Debug, Clone)]
pub(crate) struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub part: Option<XmlPart>,
    pub dirty: bool,
    is_dir: bool,
}

/// An in-memory DOCX template, loaded fresh for every recipient.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    pub(crate) entries: Vec<PackageEntry>,
}

impl DocxPackage {
    /// Load a package from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_archive(ZipArchive::new(file).map_err(|e| {
            CertMergeError::Package(format!("failed to open DOCX as ZIP: {e}"))
        })?)
    }

    /// Load a package from bytes already in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_archive(ZipArchive::new(Cursor::new(bytes.to_vec())).map_err(|e| {
            CertMergeError::Package(format!("failed to open DOCX as ZIP: {e}"))
        })?)
    }

    fn from_archive<R: Read + std::io::Seek>(mut archive: ZipArchive<R>) -> Result<Self> {
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(|e| {
                CertMergeError::Package(format!("failed to read archive entry: {e}"))
            })?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let mut data = Vec::new();
            if !is_dir {
                file.read_to_end(&mut data)?;
            }

            let part = if !is_dir && is_text_part(&name) {
                let xml = String::from_utf8_lossy(&data);
                Some(XmlPart::parse(&xml)?)
            } else {
                None
            };

            entries.push(PackageEntry {
                name,
                data,
                part,
                dirty: false,
                is_dir,
            });
        }

        let pkg = Self { entries };
        if pkg.part_index(DOCUMENT_PART).is_none() {
            return Err(CertMergeError::Package(
                "missing word/document.xml".to_string(),
            ));
        }
        Ok(pkg)
    }

    /// Serialize the package to disk, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Serialize the package into a byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();

        for entry in &self.entries {
            if entry.is_dir {
                writer.add_directory(entry.name.clone(), options).map_err(|e| {
                    CertMergeError::Package(format!("failed to write archive entry: {e}"))
                })?;
                continue;
            }
            writer.start_file(entry.name.clone(), options).map_err(|e| {
                CertMergeError::Package(format!("failed to write archive entry: {e}"))
            })?;
            match (&entry.part, entry.dirty) {
                (Some(part), true) => writer.write_all(part.to_xml().as_bytes())?,
                _ => writer.write_all(&entry.data)?,
            }
        }

        let cursor = writer.finish().map_err(|e| {
            CertMergeError::Package(format!("failed to finish archive: {e}"))
        })?;
        Ok(cursor.into_inner())
    }

    /// Index of a named entry that was parsed as a text part.
    pub(crate) fn part_index(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name == name && entry.part.is_some())
    }

    /// All header/footer part indexes, by entry name order.
    pub(crate) fn header_footer_indexes(&self) -> Vec<usize> {
        let mut indexes: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.part.is_some() && entry.name != DOCUMENT_PART)
            .map(|(index, _)| index)
            .collect();
        indexes.sort_by(|a, b| self.entries[*a].name.cmp(&self.entries[*b].name));
        indexes
    }

    /// Name of an entry.
    pub(crate) fn entry_name(&self, index: usize) -> &str {
        &self.entries[index].name
    }

    /// Parsed tree of a text part.
    pub(crate) fn part(&self, index: usize) -> Option<&XmlPart> {
        self.entries.get(index).and_then(|entry| entry.part.as_ref())
    }

    /// Mutable parsed tree of a text part; marks the part dirty.
    pub(crate) fn part_mut(&mut self, index: usize) -> Option<&mut XmlPart> {
        let entry = self.entries.get_mut(index)?;
        entry.dirty = true;
        entry.part.as_mut()
    }

    /// Relationship id to target map from `word/_rels/document.xml.rels`.
    /// A missing or malformed relationships part yields an empty map.
    pub(crate) fn document_relationships(&self) -> HashMap<String, String> {
        let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.name == "word/_rels/document.xml.rels")
        else {
            return HashMap::new();
        };
        parse_relationships(&String::from_utf8_lossy(&entry.data))
    }
}

fn is_text_part(name: &str) -> bool {
    if name == DOCUMENT_PART {
        return true;
    }
    let Some(stem) = name
        .strip_prefix("word/")
        .and_then(|rest| rest.strip_suffix(".xml"))
    else {
        return false;
    };
    for prefix in ["header", "footer"] {
        if let Some(digits) = stem.strip_prefix(prefix) {
            return !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
        }
    }
    false
}

/// Extract `Id -> Target` pairs from a relationships part.
fn parse_relationships(xml: &str) -> HashMap<String, String> {
    let mut relationships = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"Relationship" => {
                let mut rel_id = None;
                let mut target = None;
                for attr in e.attributes().with_checks(false) {
                    let Ok(attr) = attr else { continue };
                    match attr.key.as_ref() {
                        b"Id" => rel_id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => {
                            target = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(tgt)) = (rel_id, target) {
                    relationships.insert(id, tgt);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    relationships
}

/// Find the template file: the first `.docx` in the folder, name order,
/// Word lock files (`~$...`) excluded. Extra templates are reported so the
/// caller can warn.
pub fn find_template_file(dir: &Path) -> Result<(PathBuf, usize)> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"))
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("~$"))
        })
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Err(CertMergeError::TemplateNotFound(dir.to_path_buf())),
        n => Ok((candidates.remove(0), n - 1)),
    }
}
