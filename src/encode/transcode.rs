use std::fmt;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::foundation::core::FrameSize;

/// Pipeline stage a transcode belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Numbered frames -> compressed video.
    Video,
    /// Video -> reduced colour palette.
    Palette,
    /// Video + palette -> dithered animated image.
    AnimatedImage,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Palette => "palette",
            Self::AnimatedImage => "animated_image",
        })
    }
}

/// Failure of a single transcoder invocation.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    /// The transcoder binary could not be started.
    #[error("{stage} stage: failed to spawn transcoder: {source}")]
    Spawn {
        /// Stage being run.
        stage: Stage,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The transcoder ran and reported failure.
    #[error("{stage} stage: transcoder exited with code {exit_code:?}: {stderr}")]
    Failed {
        /// Stage being run.
        stage: Stage,
        /// Exit code, `None` when killed by a signal.
        exit_code: Option<i32>,
        /// Captured diagnostic output.
        stderr: String,
    },

    /// A required input artifact does not exist.
    #[error("{stage} stage: input '{}' does not exist", path.display())]
    MissingInput {
        /// Stage being run.
        stage: Stage,
        /// Missing input.
        path: PathBuf,
    },

    /// The transcoder reported success but the declared output is absent.
    #[error("{stage} stage: output '{}' was not produced", path.display())]
    MissingOutput {
        /// Stage being run.
        stage: Stage,
        /// Expected output.
        path: PathBuf,
    },

    /// The stage was cancelled before it finished.
    #[error("{stage} stage: cancelled")]
    Cancelled {
        /// Stage being run.
        stage: Stage,
    },
}

impl EncodeError {
    /// Stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Spawn { stage, .. }
            | Self::Failed { stage, .. }
            | Self::MissingInput { stage, .. }
            | Self::MissingOutput { stage, .. }
            | Self::Cancelled { stage } => *stage,
        }
    }
}

/// Resampling filter used when scaling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleFilter {
    /// Lanczos; sharp downscales for small animated images.
    #[default]
    Lanczos,
    /// Bicubic.
    Bicubic,
}

/// Palette statistics mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatsMode {
    /// Compute one palette over the whole input.
    Full,
    /// Single-pass statistics, favouring per-frame colours.
    #[default]
    Single,
}

/// Dithering applied when mapping onto the reduced palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dither {
    /// Ordered Bayer-matrix dithering; `scale` in `0..=5`, higher is less visible pattern.
    Bayer {
        /// Bayer pattern scale.
        scale: u8,
    },
    /// No dithering.
    None,
}

impl Default for Dither {
    fn default() -> Self {
        Self::Bayer { scale: 5 }
    }
}

/// Frames -> H.264 video.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSpec {
    /// Numbered-frame input pattern.
    pub input_pattern: PathBuf,
    /// Input and output frame rate.
    pub frame_rate: u32,
    /// Output size.
    pub size: FrameSize,
    /// Video codec.
    pub codec: &'static str,
    /// Output pixel format.
    pub pixel_format: &'static str,
    /// Constant rate factor (lower is better quality).
    pub crf: u8,
    /// Output file.
    pub output: PathBuf,
}

impl VideoSpec {
    /// H.264 / yuv420p / CRF 23.
    pub fn h264(
        input_pattern: impl Into<PathBuf>,
        frame_rate: u32,
        size: FrameSize,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_pattern: input_pattern.into(),
            frame_rate,
            size,
            codec: "libx264",
            pixel_format: "yuv420p",
            crf: 23,
            output: output.into(),
        }
    }
}

/// Video -> palette image.
#[derive(Clone, Debug, PartialEq)]
pub struct PaletteSpec {
    /// Source video.
    pub input: PathBuf,
    /// Sampling frame rate.
    pub frame_rate: u32,
    /// Size the palette is computed at (the animated-image size).
    pub size: FrameSize,
    /// Resampling filter.
    pub scale_filter: ScaleFilter,
    /// Maximum palette entries.
    pub max_colors: u16,
    /// Statistics mode.
    pub stats_mode: StatsMode,
    /// Output palette file.
    pub output: PathBuf,
}

impl PaletteSpec {
    /// 128 colours, lanczos scaling, single-pass statistics.
    pub fn new(
        input: impl Into<PathBuf>,
        frame_rate: u32,
        size: FrameSize,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            frame_rate,
            size,
            scale_filter: ScaleFilter::Lanczos,
            max_colors: 128,
            stats_mode: StatsMode::Single,
            output: output.into(),
        }
    }
}

/// Video + palette -> looping animated image.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatedImageSpec {
    /// Source video.
    pub input: PathBuf,
    /// Palette produced by the palette stage.
    pub palette: PathBuf,
    /// Output frame rate.
    pub frame_rate: u32,
    /// Output size.
    pub size: FrameSize,
    /// Resampling filter.
    pub scale_filter: ScaleFilter,
    /// Dithering mode.
    pub dither: Dither,
    /// Loop count; `0` loops forever.
    pub loop_count: u32,
    /// Output file.
    pub output: PathBuf,
}

impl AnimatedImageSpec {
    /// Bayer-dithered (scale 5), lanczos scaling, infinite loop.
    pub fn new(
        input: impl Into<PathBuf>,
        palette: impl Into<PathBuf>,
        frame_rate: u32,
        size: FrameSize,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            palette: palette.into(),
            frame_rate,
            size,
            scale_filter: ScaleFilter::Lanczos,
            dither: Dither::default(),
            loop_count: 0,
            output: output.into(),
        }
    }
}

/// Structured request for one transcoder invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum TranscodeSpec {
    /// Video stage.
    Video(VideoSpec),
    /// Palette stage.
    Palette(PaletteSpec),
    /// Animated-image stage.
    AnimatedImage(AnimatedImageSpec),
}

impl TranscodeSpec {
    /// Stage this request belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Video(_) => Stage::Video,
            Self::Palette(_) => Stage::Palette,
            Self::AnimatedImage(_) => Stage::AnimatedImage,
        }
    }

    /// File this request produces.
    pub fn output(&self) -> &Path {
        match self {
            Self::Video(s) => &s.output,
            Self::Palette(s) => &s.output,
            Self::AnimatedImage(s) => &s.output,
        }
    }

    /// Concrete input files that must exist beforehand.
    ///
    /// The video stage reads a numbered pattern, which is not a file.
    pub fn input_files(&self) -> Vec<&Path> {
        match self {
            Self::Video(_) => Vec::new(),
            Self::Palette(s) => vec![s.input.as_path()],
            Self::AnimatedImage(s) => vec![s.input.as_path(), s.palette.as_path()],
        }
    }

    /// Return the first declared input file that is missing.
    pub fn check_inputs(&self) -> Result<(), EncodeError> {
        match self.input_files().into_iter().find(|p| !p.is_file()) {
            Some(missing) => Err(EncodeError::MissingInput {
                stage: self.stage(),
                path: missing.to_path_buf(),
            }),
            None => Ok(()),
        }
    }
}

/// External transcoder collaborator.
///
/// Implementations block until the artifact is written (or the token is cancelled) and return
/// the output path.
pub trait Transcoder: Send + Sync {
    /// Run one stage.
    fn transcode(
        &self,
        spec: &TranscodeSpec,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, EncodeError>;
}
