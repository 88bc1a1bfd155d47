use std::path::Path;

use image::imageops::FilterType;

use crate::foundation::core::FrameSize;
use crate::foundation::error::{PanoError, PanoResult};

/// Bounding box thumbnails are fitted into.
pub const THUMBNAIL_BOUNDS: FrameSize = FrameSize {
    width: 200,
    height: 100,
};

/// Largest size with the aspect of `src` that fits `bounds`. Never below 1×1.
pub fn fit_within(src: FrameSize, bounds: FrameSize) -> FrameSize {
    let scale = f64::min(
        f64::from(bounds.width) / f64::from(src.width.max(1)),
        f64::from(bounds.height) / f64::from(src.height.max(1)),
    );
    let dim = |v: u32| ((f64::from(v) * scale).floor() as u32).max(1);
    FrameSize::new(dim(src.width), dim(src.height))
}

/// Decode `src`, fit it into [`THUMBNAIL_BOUNDS`] with bilinear filtering and write WebP to `dest`.
pub fn write_thumbnail(src: &Path, dest: &Path) -> PanoResult<FrameSize> {
    let img = image::open(src)
        .map_err(|e| PanoError::render(format!("decode '{}': {e}", src.display())))?
        .to_rgba8();
    let size = fit_within(FrameSize::new(img.width(), img.height()), THUMBNAIL_BOUNDS);
    let thumb = image::imageops::resize(&img, size.width, size.height, FilterType::Triangle);
    thumb
        .save_with_format(dest, image::ImageFormat::WebP)
        .map_err(|e| PanoError::render(format!("write thumbnail '{}': {e}", dest.display())))?;
    Ok(size)
}
