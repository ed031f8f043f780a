use crate::config::service_config::DEFAULT_MAX_UNPACKED_BYTES;
use crate::domain::model::{
    ContainerEntry, DocumentContainer, PartKind, Relationship, RelationshipTable, XmlPart,
};
use crate::utils::error::{DocError, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DEFAULT_MAIN_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

impl DocumentContainer {
    /// Reads every entry of a zip archive, keeping archive order, with the
    /// default unpacked-size limit.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_limited(bytes, DEFAULT_MAX_UNPACKED_BYTES)
    }

    /// Like `from_bytes`, refusing archives whose entries together unpack to
    /// more than `max_unpacked` bytes. Declared sizes are not trusted: reads
    /// are cut off at the remaining budget.
    pub fn from_bytes_limited(bytes: &[u8], max_unpacked: usize) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DocError::input(format!("not a valid document container: {}", e)))?;

        let mut remaining = max_unpacked as u64;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| DocError::input(format!("corrupt entry #{}: {}", i, e)))?;
            let name = file.name().to_string();
            if entries.iter().any(|e: &ContainerEntry| e.name == name) {
                return Err(DocError::input(format!(
                    "container has a duplicate entry '{}'",
                    name
                )));
            }

            if file.size() > remaining {
                return Err(unpack_limit_error(&name, max_unpacked));
            }

            let mut data = Vec::new();
            file.by_ref()
                .take(remaining.saturating_add(1))
                .read_to_end(&mut data)
                .map_err(|e| DocError::input(format!("corrupt entry '{}': {}", name, e)))?;
            if data.len() as u64 > remaining {
                return Err(unpack_limit_error(&name, max_unpacked));
            }
            remaining -= data.len() as u64;

            entries.push(ContainerEntry {
                name,
                data,
                stored: file.compression() == CompressionMethod::Stored,
                last_modified: file.last_modified(),
                is_dir: file.is_dir(),
            });
        }

        tracing::debug!("Opened container with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Writes the entries back out. Stored entries stay stored, everything else is
    /// deflated, and timestamps are carried over, so equal input gives equal output.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = if entry.stored {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = SimpleFileOptions::default()
                .compression_method(method)
                .last_modified_time(entry.last_modified.unwrap_or_default());

            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
            } else {
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(&entry.data)?;
            }
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Name of the main document part, taken from the package relationships.
    pub fn main_part_name(&self) -> String {
        self.get("_rels/.rels")
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .and_then(|xml| parse_relationships(xml).ok())
            .and_then(|table| {
                table
                    .entries
                    .into_values()
                    .find(|rel| rel.kind.as_deref() == Some(OFFICE_DOCUMENT_REL) && !rel.external)
                    .map(|rel| resolve_target("", &rel.target))
            })
            .filter(|name| self.contains(name))
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string())
    }

    /// The body, headers and footers, in resolution priority order.
    pub fn markup_parts(&self) -> Vec<XmlPart> {
        let main = self.main_part_name();
        let dir = parent_dir(&main);

        let mut parts: Vec<XmlPart> = self
            .entries
            .iter()
            .filter(|e| !e.is_dir)
            .filter_map(|e| {
                let kind = if e.name == main {
                    PartKind::Body
                } else {
                    classify_header_footer(dir, &e.name)?
                };
                match String::from_utf8(e.data.clone()) {
                    Ok(text) => Some(XmlPart {
                        name: e.name.clone(),
                        kind,
                        text,
                    }),
                    Err(_) => {
                        tracing::warn!(part = %e.name, "Skipping markup part that is not UTF-8");
                        None
                    }
                }
            })
            .collect();

        parts.sort_by_key(|p| p.kind);
        parts
    }

    /// Relationship table belonging to `part`, empty when the part has none.
    pub fn relationships_for(&self, part: &str) -> Result<RelationshipTable> {
        let rels_name = rels_path_for(part);
        match self.get(&rels_name) {
            Some(bytes) => {
                let xml = std::str::from_utf8(bytes).map_err(|_| {
                    DocError::input(format!("relationship table '{}' is not UTF-8", rels_name))
                })?;
                parse_relationships(xml)
            }
            None => Ok(RelationshipTable::default()),
        }
    }
}

fn parse_relationships(xml: &str) -> Result<RelationshipTable> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| DocError::input(format!("malformed relationship table: {}", e)))?;

    let entries = doc
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
        .filter_map(|n| {
            let rel = Relationship {
                id: n.attribute("Id")?.to_string(),
                target: n.attribute("Target")?.to_string(),
                kind: n.attribute("Type").map(str::to_string),
                external: n
                    .attribute("TargetMode")
                    .is_some_and(|m| m.eq_ignore_ascii_case("External")),
            };
            Some((rel.id.clone(), rel))
        })
        .collect();

    Ok(RelationshipTable { entries })
}

fn classify_header_footer(dir: &str, name: &str) -> Option<PartKind> {
    let file = if dir.is_empty() {
        name
    } else {
        name.strip_prefix(dir)?.strip_prefix('/')?
    };
    if file.contains('/') {
        return None;
    }
    let stem = file.strip_suffix(".xml")?;
    if let Some(n) = stem.strip_prefix("header") {
        return n.parse().ok().map(PartKind::Header);
    }
    if let Some(n) = stem.strip_prefix("footer") {
        return n.parse().ok().map(PartKind::Footer);
    }
    None
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn unpack_limit_error(name: &str, limit: usize) -> DocError {
    DocError::input(format!(
        "entry '{}' pushes the unpacked document past the limit of {} bytes",
        name, limit
    ))
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Turns a relationship target into a container entry name, relative to the
/// part that owns the relationship. Handles `media/x.png`, `../media/x.png`
/// and package-absolute `/word/media/x.png`.
pub fn resolve_target(part: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    if let Some(absolute) = target.strip_prefix('/') {
        push_segments(&mut segments, absolute);
    } else {
        push_segments(&mut segments, parent_dir(part));
        push_segments(&mut segments, &target);
    }

    segments.join("/")
}

fn push_segments<'a>(segments: &mut Vec<&'a str>, path: &'a str) {
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
}
