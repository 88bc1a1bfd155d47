use std::path::Path;
use std::sync::Arc;

use image::RgbImage;

use crate::foundation::error::{PanoError, PanoResult};

/// Immutable equirectangular source raster (RGB8).
///
/// Cloning is cheap; the pixel buffer is shared.
#[derive(Clone, Debug)]
pub struct SphereImage {
    pixels: Arc<RgbImage>,
}

impl SphereImage {
    /// Wrap an already-decoded RGB raster.
    pub fn from_rgb(pixels: RgbImage) -> PanoResult<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(PanoError::render("source panorama is empty"));
        }
        if u64::from(pixels.width()) != 2 * u64::from(pixels.height()) {
            tracing::warn!(
                width = pixels.width(),
                height = pixels.height(),
                "source panorama is not 2:1; poles will be distorted"
            );
        }
        Ok(Self {
            pixels: Arc::new(pixels),
        })
    }

    /// Decode encoded image bytes.
    pub fn decode(bytes: &[u8]) -> PanoResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| PanoError::render(format!("decode source panorama: {e}")))?;
        Self::from_rgb(img.to_rgb8())
    }

    /// Load and decode a panorama from disk.
    ///
    /// A missing file is an input error; an unreadable or corrupt one is a render error.
    pub fn open(path: &Path) -> PanoResult<Self> {
        if !path.is_file() {
            return Err(PanoError::input(format!(
                "source panorama '{}' does not exist",
                path.display()
            )));
        }
        let img = image::open(path).map_err(|e| {
            PanoError::render(format!("read source panorama '{}': {e}", path.display()))
        })?;
        Self::from_rgb(img.to_rgb8())
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Borrow the underlying raster.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}
