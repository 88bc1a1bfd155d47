use crate::foundation::error::{PanoError, PanoResult};
use crate::foundation::math::{floor_even, floor_even_f64};

/// How the sampler reads the source panorama.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Nearest source pixel. Faster, blockier.
    Nearest,
    /// Bilinear interpolation between the four surrounding source pixels.
    #[default]
    Bilinear,
}

/// Output raster dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Create a size without validation.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Return `true` when both dimensions are non-zero and even.
    pub fn is_codec_friendly(self) -> bool {
        self.width > 0
            && self.height > 0
            && self.width.is_multiple_of(2)
            && self.height.is_multiple_of(2)
    }

    /// Width/height ratio.
    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Virtual camera for one rendered frame.
///
/// Angles are radians, `fov_x` is degrees. Only `yaw` varies across a sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParameters {
    /// Rotation about the vertical axis, radians.
    pub yaw: f64,
    /// Rotation about the camera's horizontal axis, radians.
    pub pitch: f64,
    /// Rotation about the viewing axis, radians.
    pub roll: f64,
    /// Horizontal field of view in degrees, strictly inside `(0, 180)`.
    pub fov_x: f64,
    /// Output size; both dimensions positive and even.
    pub size: FrameSize,
    /// Source sampling mode.
    pub mode: SamplingMode,
}

impl ViewParameters {
    /// A level camera looking along `yaw_deg` degrees.
    pub fn level(yaw_deg: f64, fov_x: f64, size: FrameSize, mode: SamplingMode) -> Self {
        Self {
            yaw: yaw_deg.to_radians(),
            pitch: 0.0,
            roll: 0.0,
            fov_x,
            size,
            mode,
        }
    }

    /// Check the field of view, orientation and output size.
    pub fn validate(&self) -> PanoResult<()> {
        validate_fov(self.fov_x)?;
        if !(self.yaw.is_finite() && self.pitch.is_finite() && self.roll.is_finite()) {
            return Err(PanoError::input("yaw/pitch/roll must be finite"));
        }
        if !self.size.is_codec_friendly() {
            return Err(PanoError::input(format!(
                "output size {}x{} must be positive and even",
                self.size.width, self.size.height
            )));
        }
        Ok(())
    }
}

/// Reject a horizontal field of view outside `(0, 180)` degrees.
pub fn validate_fov(fov_x: f64) -> PanoResult<()> {
    if !fov_x.is_finite() || fov_x <= 0.0 || fov_x >= 180.0 {
        return Err(PanoError::input(format!(
            "fov_x must be inside (0, 180) degrees, got {fov_x}"
        )));
    }
    Ok(())
}

/// Parameters for one panorama animation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationSettings {
    /// Output frames per second.
    pub frame_rate: u32,
    /// Number of frames in one full turn.
    pub num_frames: u32,
    /// Requested frame width. Ignored when `height` is set.
    pub width: u32,
    /// Requested frame height. When set, width is derived from it.
    pub height: Option<u32>,
    /// Width/height ratio of the output frames.
    pub aspect_ratio: f64,
    /// Horizontal field of view in degrees.
    pub fov_x: f64,
    /// Height of the animated image; `None` keeps the frame size.
    pub gif_size: Option<u32>,
    /// Source sampling mode.
    pub sampling: SamplingMode,
    /// Delete frame files once encoding is done.
    pub cleanup_frames: bool,
    /// Rendering threads; `None` uses rayon's default.
    pub threads: Option<usize>,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            frame_rate: 10,
            num_frames: 90,
            width: 320,
            height: None,
            aspect_ratio: 1.0,
            fov_x: 80.0,
            gif_size: Some(200),
            sampling: SamplingMode::Bilinear,
            cleanup_frames: true,
            threads: None,
        }
    }
}

impl AnimationSettings {
    /// Check every field before any rendering starts.
    pub fn validate(&self) -> PanoResult<()> {
        if self.frame_rate == 0 {
            return Err(PanoError::input("frame_rate must be >= 1"));
        }
        if self.num_frames == 0 {
            return Err(PanoError::input("num_frames must be >= 1"));
        }
        if self.width == 0 || self.height == Some(0) {
            return Err(PanoError::input("width and height must be positive"));
        }
        if !self.aspect_ratio.is_finite() || self.aspect_ratio <= 0.0 {
            return Err(PanoError::input("aspect_ratio must be positive"));
        }
        if self.gif_size == Some(0) {
            return Err(PanoError::input("gif_size must be positive"));
        }
        if self.threads == Some(0) {
            return Err(PanoError::input("threads must be >= 1 when set"));
        }
        validate_fov(self.fov_x)?;
        Ok(())
    }

    /// Even-rounded frame size. See [`resolve_output_size`].
    pub fn frame_size(&self) -> PanoResult<FrameSize> {
        resolve_output_size(self.width, self.height, self.aspect_ratio)
    }

    /// Even-rounded animated-image size. See [`resolve_gif_size`].
    pub fn gif_frame_size(&self) -> PanoResult<FrameSize> {
        resolve_gif_size(self.frame_size()?, self.gif_size, self.aspect_ratio)
    }
}

/// Resolve frame dimensions from a width or an explicit height plus an aspect ratio.
///
/// With `height`, width is `height * aspect`; otherwise height is `width / aspect`. Both results
/// are rounded down to even so they never exceed the requested bound.
pub fn resolve_output_size(
    width: u32,
    height: Option<u32>,
    aspect_ratio: f64,
) -> PanoResult<FrameSize> {
    if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
        return Err(PanoError::input("aspect_ratio must be positive"));
    }
    let size = match height {
        Some(h) => FrameSize::new(floor_even_f64(f64::from(h) * aspect_ratio), floor_even(h)),
        None => FrameSize::new(floor_even(width), floor_even_f64(f64::from(width) / aspect_ratio)),
    };
    if !size.is_codec_friendly() {
        return Err(PanoError::input(format!(
            "resolved output size {}x{} is empty after even rounding",
            size.width, size.height
        )));
    }
    Ok(size)
}

/// Resolve the animated-image size: `gif_size` is the height, width follows the aspect ratio.
pub fn resolve_gif_size(
    frame: FrameSize,
    gif_size: Option<u32>,
    aspect_ratio: f64,
) -> PanoResult<FrameSize> {
    let Some(gif_height) = gif_size else {
        return Ok(frame);
    };
    let size = FrameSize::new(
        floor_even_f64(f64::from(gif_height) * aspect_ratio),
        floor_even(gif_height),
    );
    if !size.is_codec_friendly() {
        return Err(PanoError::input(format!(
            "resolved gif size {}x{} is empty after even rounding",
            size.width, size.height
        )));
    }
    Ok(size)
}

/// Yaw angles in degrees for a full turn: `360 * k / n` for `k in 0..n`.
pub fn yaw_steps(num_frames: u32) -> PanoResult<Vec<f64>> {
    if num_frames == 0 {
        return Err(PanoError::input("num_frames must be >= 1"));
    }
    let n = f64::from(num_frames);
    Ok((0..num_frames)
        .map(|k| 360.0 * f64::from(k) / n)
        .collect())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
