use crate::core::{normalizer, relationships};
use crate::domain::model::{DocumentContainer, ImagePlaceholder, XmlPart};
use crate::utils::error::{DocError, Result};

/// Swaps the picture behind an alt-text marker for new image bytes.
#[derive(Debug, Clone)]
pub struct ContainerPatcher {
    marker: String,
}

impl ContainerPatcher {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Finds the media entry to overwrite. The normalized markup is only
    /// scanned, never written back.
    pub fn locate(&self, container: &DocumentContainer) -> Result<ImagePlaceholder> {
        let parts: Vec<XmlPart> = container
            .markup_parts()
            .into_iter()
            .map(|mut part| {
                part.text = normalizer::normalize(&part.text);
                part
            })
            .collect();

        tracing::debug!("Scanning {} markup parts for '{}'", parts.len(), self.marker);

        relationships::resolve(container, &parts, &self.marker).ok_or_else(|| {
            DocError::PlaceholderNotFound {
                marker: self.marker.clone(),
            }
        })
    }

    /// Overwrites the resolved media entry; every other entry is left alone.
    pub fn apply(
        &self,
        container: &mut DocumentContainer,
        placeholder: &ImagePlaceholder,
        image: Vec<u8>,
    ) -> Result<()> {
        let size = image.len();
        if !container.replace(&placeholder.resolved_media_path, image) {
            return Err(DocError::PlaceholderNotFound {
                marker: self.marker.clone(),
            });
        }
        tracing::info!(
            media = %placeholder.resolved_media_path,
            part = %placeholder.containing_part,
            bytes = size,
            "🖼️ Replaced placeholder image"
        );
        Ok(())
    }

    /// Whole-archive form: bytes in, bytes out. On `PlaceholderNotFound`
    /// nothing has been written and the caller still owns the original bytes.
    pub fn patch_image(&self, container_bytes: &[u8], new_image: &[u8]) -> Result<Vec<u8>> {
        let mut container = DocumentContainer::from_bytes(container_bytes)?;
        let placeholder = self.locate(&container)?;
        self.apply(&mut container, &placeholder, new_image.to_vec())?;
        container.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::*;

    const MARKER: &str = "{{obraz}}";

    fn sample_docx() -> Vec<u8> {
        let body = format!(
            "{}{}",
            r#"<w:p><w:r><w:t>Hello {{na</w:t></w:r><w:r><w:t>me}}</w:t></w:r></w:p>"#,
            picture_paragraph("descr", MARKER, "rId7")
        );
        let doc = document_xml(&body);
        let rels = rels_xml(&[("rId7", "media/image1.png"), ("rId8", "media/logo.png")]);
        build_docx(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
            ("word/media/image1.png", b"placeholder-image"),
            ("word/media/logo.png", b"logo"),
            ("word/styles.xml", b"<w:styles/>"),
        ])
    }

    #[test]
    fn test_patch_replaces_only_target_entry() {
        let input = sample_docx();
        let patcher = ContainerPatcher::new(MARKER);
        let new_image = vec![7u8; 4096];

        let output = patcher.patch_image(&input, &new_image).unwrap();

        let before = DocumentContainer::from_bytes(&input).unwrap();
        let after = DocumentContainer::from_bytes(&output).unwrap();
        assert_eq!(before.len(), after.len());
        for entry in before.entries() {
            let patched = after.get(&entry.name).unwrap();
            if entry.name == "word/media/image1.png" {
                assert_eq!(patched, new_image.as_slice());
            } else {
                assert_eq!(patched, entry.data.as_slice(), "{} changed", entry.name);
            }
        }
    }

    #[test]
    fn test_patch_is_deterministic() {
        let input = sample_docx();
        let patcher = ContainerPatcher::new(MARKER);
        let first = patcher.patch_image(&input, b"new").unwrap();
        let second = patcher.patch_image(&input, b"new").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_marker_reports_not_found() {
        let input = sample_docx();
        let patcher = ContainerPatcher::new("{{podpis}}");

        let err = patcher.patch_image(&input, b"new").unwrap_err();
        match err {
            DocError::PlaceholderNotFound { marker } => assert_eq!(marker, "{{podpis}}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_locate_reports_placeholder() {
        let container = DocumentContainer::from_bytes(&sample_docx()).unwrap();
        let placeholder = ContainerPatcher::new(MARKER).locate(&container).unwrap();
        assert_eq!(placeholder.resolved_media_path, "word/media/image1.png");
        assert_eq!(placeholder.relationship_id, "rId7");
    }
}
