//! Finding the media entry behind an alt-text marker.
//!
//! Each markup part is parsed as a tree; the picture's non-visual properties
//! (`wp:docPr`, or `pic:cNvPr` for a picture inside a group) identify it by
//! `descr` or `title`, and the `a:blip` inside the same drawing carries the
//! relationship id that the part's `_rels` table maps to a media path.
//!
//! Only the first resolvable placeholder is returned: parts are tried body
//! first, then headers, then footers, and resolution stops at the first
//! success. Other pictures carrying the same marker are left untouched.

use crate::core::container::resolve_target;
use crate::domain::model::{DocumentContainer, ImagePlaceholder, XmlPart};
use roxmltree::Node;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Tries `parts` in the order given (see `DocumentContainer::markup_parts`).
pub fn resolve(
    container: &DocumentContainer,
    parts: &[XmlPart],
    marker: &str,
) -> Option<ImagePlaceholder> {
    parts.iter().find_map(|part| {
        let found = resolve_in_part(container, part, marker);
        if found.is_none() {
            tracing::debug!(part = %part.name, "No resolvable placeholder in part");
        }
        found
    })
}

fn resolve_in_part(
    container: &DocumentContainer,
    part: &XmlPart,
    marker: &str,
) -> Option<ImagePlaceholder> {
    let doc = match roxmltree::Document::parse(&part.text) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(part = %part.name, "Cannot parse markup part: {}", e);
            return None;
        }
    };

    let props = doc
        .descendants()
        .find(|n| is_drawing_properties(n) && carries_marker(n, marker))?;

    let rel_id = image_reference(props)?;

    let table = match container.relationships_for(&part.name) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!(part = %part.name, "Cannot read relationship table: {}", e);
            return None;
        }
    };
    let rel = table.get(rel_id)?;
    if rel.external {
        tracing::debug!(part = %part.name, rel_id, "Placeholder points at an external image");
        return None;
    }

    let media_path = resolve_target(&part.name, &rel.target);
    if !container.contains(&media_path) {
        tracing::debug!(part = %part.name, %media_path, "Relationship target missing from container");
        return None;
    }

    tracing::debug!(part = %part.name, rel_id, %media_path, "Resolved image placeholder");
    Some(ImagePlaceholder {
        alt_text: marker.to_string(),
        containing_part: part.name.clone(),
        relationship_id: rel_id.to_string(),
        resolved_media_path: media_path,
    })
}

fn is_drawing_properties(node: &Node) -> bool {
    node.is_element() && matches!(node.tag_name().name(), "docPr" | "cNvPr")
}

fn carries_marker(node: &Node, marker: &str) -> bool {
    node.attribute("descr") == Some(marker) || node.attribute("title") == Some(marker)
}

/// The `r:embed` id of the picture `props` describes.
fn image_reference<'a>(props: Node<'a, 'a>) -> Option<&'a str> {
    // nearest enclosing picture, else the whole drawing
    let scope = props
        .ancestors()
        .find(|n| matches!(n.tag_name().name(), "pic" | "drawing"))?;

    scope
        .descendants()
        .filter(|n| n.tag_name().name() == "blip")
        .find_map(|blip| blip.attribute((REL_NS, "embed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::*;

    const MARKER: &str = "{{obraz}}";

    fn open(entries: &[(&str, &[u8])]) -> DocumentContainer {
        DocumentContainer::from_bytes(&build_docx(entries)).unwrap()
    }

    #[test]
    fn test_resolves_body_placeholder_by_description() {
        let doc = document_xml(&picture_paragraph("descr", MARKER, "rId5"));
        let rels = rels_xml(&[("rId5", "media/image1.png")]);
        let container = open(&[
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
            ("word/media/image1.png", b"old"),
        ]);

        let found = resolve(&container, &container.markup_parts(), MARKER).unwrap();
        assert_eq!(found.containing_part, "word/document.xml");
        assert_eq!(found.relationship_id, "rId5");
        assert_eq!(found.resolved_media_path, "word/media/image1.png");
        assert_eq!(found.alt_text, MARKER);
    }

    #[test]
    fn test_resolves_by_title_and_parent_relative_target() {
        let doc = document_xml(&picture_paragraph("title", MARKER, "rId2"));
        let rels = rels_xml(&[("rId2", "../word/media/seal.jpeg")]);
        let container = open(&[
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
            ("word/media/seal.jpeg", b"old"),
        ]);

        let found = resolve(&container, &container.markup_parts(), MARKER).unwrap();
        assert_eq!(found.resolved_media_path, "word/media/seal.jpeg");
    }

    #[test]
    fn test_body_wins_over_header() {
        let doc = document_xml(&picture_paragraph("descr", MARKER, "rId1"));
        let hdr = header_xml(&picture_paragraph("descr", MARKER, "rId1"));
        let body_rels = rels_xml(&[("rId1", "media/body.png")]);
        let hdr_rels = rels_xml(&[("rId1", "media/header.png")]);
        // header listed first in the archive on purpose
        let container = open(&[
            ("word/header1.xml", hdr.as_bytes()),
            ("word/_rels/header1.xml.rels", hdr_rels.as_bytes()),
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", body_rels.as_bytes()),
            ("word/media/body.png", b"b"),
            ("word/media/header.png", b"h"),
        ]);

        let found = resolve(&container, &container.markup_parts(), MARKER).unwrap();
        assert_eq!(found.resolved_media_path, "word/media/body.png");
    }

    #[test]
    fn test_falls_through_to_footer_when_earlier_parts_fail() {
        // body references a relationship that does not exist
        let doc = document_xml(&picture_paragraph("descr", MARKER, "rId404"));
        let ftr = footer_xml(&picture_paragraph("descr", MARKER, "rId3"));
        let ftr_rels = rels_xml(&[("rId3", "media/footer.png")]);
        let container = open(&[
            ("word/document.xml", doc.as_bytes()),
            ("word/footer2.xml", ftr.as_bytes()),
            ("word/_rels/footer2.xml.rels", ftr_rels.as_bytes()),
            ("word/media/footer.png", b"f"),
        ]);

        let found = resolve(&container, &container.markup_parts(), MARKER).unwrap();
        assert_eq!(found.containing_part, "word/footer2.xml");
    }

    #[test]
    fn test_missing_media_entry_is_not_found() {
        let doc = document_xml(&picture_paragraph("descr", MARKER, "rId5"));
        let rels = rels_xml(&[("rId5", "media/gone.png")]);
        let container = open(&[
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
        ]);

        assert!(resolve(&container, &container.markup_parts(), MARKER).is_none());
    }

    #[test]
    fn test_marker_must_match_exactly() {
        let doc = document_xml(&picture_paragraph("descr", "{{obraz}} ", "rId5"));
        let rels = rels_xml(&[("rId5", "media/image1.png")]);
        let container = open(&[
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
            ("word/media/image1.png", b"old"),
        ]);

        assert!(resolve(&container, &container.markup_parts(), MARKER).is_none());
    }

    #[test]
    fn test_unparseable_part_is_skipped() {
        let hdr = header_xml(&picture_paragraph("descr", MARKER, "rId1"));
        let hdr_rels = rels_xml(&[("rId1", "media/h.png")]);
        let container = open(&[
            ("word/document.xml", b"<w:document><unclosed>"),
            ("word/header1.xml", hdr.as_bytes()),
            ("word/_rels/header1.xml.rels", hdr_rels.as_bytes()),
            ("word/media/h.png", b"h"),
        ]);

        let found = resolve(&container, &container.markup_parts(), MARKER).unwrap();
        assert_eq!(found.containing_part, "word/header1.xml");
    }
}
