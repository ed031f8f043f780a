use crate::config::service_config::ServiceConfig;
use crate::core::normalizer;
use crate::core::patcher::ContainerPatcher;
use crate::core::pdf;
use crate::domain::model::{DocumentContainer, HealthReport};
use crate::domain::ports::{ImageSource, TemplateEngine};
use crate::utils::error::{DocError, Result};
use std::sync::Arc;

/// Entry point for the four request kinds: render, replace-image, stamp and health.
pub struct DocumentService<I: ImageSource, T: TemplateEngine> {
    config: Arc<ServiceConfig>,
    images: I,
    engine: T,
    patcher: ContainerPatcher,
}

impl<I: ImageSource, T: TemplateEngine> DocumentService<I, T> {
    pub fn new(config: Arc<ServiceConfig>, images: I, engine: T) -> Self {
        let patcher = ContainerPatcher::new(config.placeholder_marker.clone());
        Self {
            config,
            images,
            engine,
            patcher,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn image_source(&self) -> &I {
        &self.images
    }

    /// Repairs split `{{...}}` tags in the template, then hands it to the engine.
    pub async fn render(&self, template: &[u8], data_json: &str) -> Result<Vec<u8>> {
        self.check_upload(template)?;

        let data: serde_json::Value = serde_json::from_str(data_json)
            .map_err(|e| DocError::input(format!("data is not valid JSON: {}", e)))?;
        if !data.is_object() {
            return Err(DocError::input("data must be a JSON object"));
        }

        let mut container = self.open_container(template)?;
        let mut repaired = 0;
        for part in container.markup_parts() {
            let normalized = normalizer::normalize(&part.text);
            if normalized != part.text {
                container.replace(&part.name, normalized.into_bytes());
                repaired += 1;
            }
        }
        tracing::debug!("Normalized {} markup parts before rendering", repaired);

        let rendered = self.engine.render(container, &data)?;
        let bytes = rendered.to_bytes()?;
        tracing::info!(bytes = bytes.len(), "📝 Rendered template");
        Ok(bytes)
    }

    /// Swaps the marked picture for the image at `image_url`.
    pub async fn replace_image(&self, document: &[u8], image_url: Option<&str>) -> Result<Vec<u8>> {
        self.check_upload(document)?;

        let Some(url) = requested_url(image_url) else {
            tracing::info!("No image URL supplied, returning document unchanged");
            return Ok(document.to_vec());
        };

        let mut container = self.open_container(document)?;
        // Locate before fetching so a missing marker never costs a download.
        let placeholder = self.patcher.locate(&container)?;
        tracing::debug!(
            part = %placeholder.containing_part,
            rel = %placeholder.relationship_id,
            "Found placeholder picture"
        );

        let resource = self.images.fetch_image(url).await?;
        self.patcher
            .apply(&mut container, &placeholder, resource.bytes)?;
        container.to_bytes()
    }

    /// Draws the image at `image_url` in the top-right corner of page 1.
    pub async fn stamp(&self, pdf_bytes: &[u8], image_url: Option<&str>) -> Result<Vec<u8>> {
        self.check_upload(pdf_bytes)?;

        let Some(url) = requested_url(image_url) else {
            tracing::info!("No image URL supplied, returning PDF unchanged");
            return Ok(pdf_bytes.to_vec());
        };

        let resource = self.images.fetch_image(url).await?;
        let (stamped, placement) = pdf::stamp_first_page(pdf_bytes, &resource, self.config.stamp)?;
        tracing::debug!(scale = placement.scale, source = %resource.source_url, "Stamp placed");
        Ok(stamped)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_upload_bytes: self.config.limits.max_upload_bytes,
            max_fetch_bytes: self.config.limits.max_fetch_bytes,
            fetch_timeout_ms: self.config.limits.fetch_timeout_ms,
            allowlist_configured: self.config.allowlist_configured(),
            placeholder_marker: self.config.placeholder_marker.clone(),
            checked_at: chrono::Utc::now(),
        }
    }

    fn open_container(&self, bytes: &[u8]) -> Result<DocumentContainer> {
        DocumentContainer::from_bytes_limited(bytes, self.config.limits.max_unpacked_bytes)
    }

    fn check_upload(&self, bytes: &[u8]) -> Result<()> {
        let limit = self.config.limits.max_upload_bytes;
        if bytes.len() > limit {
            return Err(DocError::UploadTooLarge {
                size: bytes.len(),
                limit,
            });
        }
        Ok(())
    }
}

fn requested_url(image_url: Option<&str>) -> Option<&str> {
    image_url.map(str::trim).filter(|u| !u.is_empty())
}
