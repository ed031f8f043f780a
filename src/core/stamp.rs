use crate::config::service_config::StampBounds;
use crate::domain::model::StampPlacement;
use crate::utils::error::{DocError, Result};

/// Fits an image into the stamp box and pins it to the page's top-right corner.
///
/// Image pixels are taken as points. The image is only ever shrunk, never
/// enlarged, and keeps its aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct StampPlacer {
    bounds: StampBounds,
}

impl StampPlacer {
    pub fn new(bounds: StampBounds) -> Self {
        Self { bounds }
    }

    pub fn place(
        &self,
        page_width: f64,
        page_height: f64,
        image_width: f64,
        image_height: f64,
    ) -> Result<StampPlacement> {
        if !(image_width > 0.0 && image_height > 0.0) {
            return Err(DocError::input(format!(
                "image has no drawable area ({} x {})",
                image_width, image_height
            )));
        }

        let scale = 1f64
            .min(self.bounds.max_width / image_width)
            .min(self.bounds.max_height / image_height);
        let draw_width = image_width * scale;
        let draw_height = image_height * scale;

        Ok(StampPlacement {
            x: page_width - draw_width - self.bounds.margin,
            y: page_height - draw_height - self.bounds.margin,
            draw_width,
            draw_height,
            scale,
        })
    }
}
