use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// One named entry of a zip-based document.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub stored: bool,
    pub last_modified: Option<zip::DateTime>,
    pub is_dir: bool,
}

/// Entry table of a DOCX-style package, in archive order. Names are unique.
#[derive(Debug, Clone, Default)]
pub struct DocumentContainer {
    pub(crate) entries: Vec<ContainerEntry>,
}

impl DocumentContainer {
    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Replaces the bytes of an existing entry. Returns false when no such entry exists.
    pub fn replace(&mut self, name: &str, data: Vec<u8>) -> bool {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.data = data;
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Which markup part a placeholder may live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PartKind {
    Body,
    Header(u32),
    Footer(u32),
}

/// Text of one markup part.
#[derive(Debug, Clone)]
pub struct XmlPart {
    pub name: String,
    pub kind: PartKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub target: String,
    pub kind: Option<String>,
    pub external: bool,
}

/// Relationship id to target, loaded from a part's `_rels` sibling.
#[derive(Debug, Clone, Default)]
pub struct RelationshipTable {
    pub(crate) entries: HashMap<String, Relationship>,
}

impl RelationshipTable {
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlaceholder {
    pub alt_text: String,
    pub containing_part: String,
    pub relationship_id: String,
    pub resolved_media_path: String,
}

/// A URL that has passed the SSRF guard. Only the guard constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeUrl(pub(crate) Url);

impl SafeUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub source_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampPlacement {
    pub x: f64,
    pub y: f64,
    pub draw_width: f64,
    pub draw_height: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub max_upload_bytes: usize,
    pub max_fetch_bytes: usize,
    pub fetch_timeout_ms: u64,
    pub allowlist_configured: bool,
    pub placeholder_marker: String,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}
