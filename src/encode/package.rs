use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::encode::transcode::{
    AnimatedImageSpec, EncodeError, PaletteSpec, TranscodeSpec, Transcoder, VideoSpec,
};
use crate::foundation::core::FrameSize;
use crate::foundation::error::{PanoError, PanoResult};
use crate::render::sequence::FrameSequence;

/// Video artifact name inside the scratch directory.
pub const VIDEO_FILE: &str = "animation.mp4";
/// Animated-image artifact name inside the scratch directory.
pub const ANIMATED_IMAGE_FILE: &str = "animation.gif";
/// Intermediate palette name; never outlives [`assemble`].
pub const PALETTE_FILE: &str = "palette.png";

/// Options for [`assemble`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackageOpts {
    /// Output frames per second.
    pub frame_rate: u32,
    /// Animated-image size.
    pub gif_size: FrameSize,
    /// Delete the frame files once all stages have run.
    pub cleanup_frames: bool,
}

/// Artifacts produced by [`assemble`].
///
/// Each artifact is independent: a missing animated image does not invalidate the video.
#[derive(Debug, Default)]
pub struct Assembled {
    /// Compressed video, when the video stage succeeded.
    pub video: Option<PathBuf>,
    /// Palette-optimised animated image, when every stage succeeded.
    pub animated_image: Option<PathBuf>,
    /// Stage failures, in stage order.
    pub failures: Vec<EncodeError>,
}

impl Assembled {
    /// Return `true` when both artifacts exist.
    pub fn is_complete(&self) -> bool {
        self.video.is_some() && self.animated_image.is_some()
    }
}

/// Removes the palette file when dropped, whatever happened in between.
struct PaletteGuard(PathBuf);

impl Drop for PaletteGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.0.display(), error = %e, "failed to remove palette"),
        }
    }
}

/// Turn a frame sequence into a video and a palette-optimised animated image.
///
/// Stages run strictly in order (video, palette, animated image), each reading the previous
/// stage's file. A failed stage skips the stages that depend on it but keeps what was already
/// produced. Only invalid options are returned as `Err`.
pub fn assemble(
    transcoder: &dyn Transcoder,
    seq: &FrameSequence,
    opts: PackageOpts,
    cancel: &CancellationToken,
) -> PanoResult<Assembled> {
    let dir = seq.dir.as_path();
    let palette_path = dir.join(PALETTE_FILE);
    let _palette_guard = PaletteGuard(palette_path.clone());

    validate(seq, &opts)?;

    let mut out = Assembled::default();

    let video = TranscodeSpec::Video(VideoSpec::h264(
        seq.input_pattern(),
        opts.frame_rate,
        seq.size,
        dir.join(VIDEO_FILE),
    ));
    out.video = run_stage(transcoder, &video, cancel, &mut out.failures);

    if let Some(video_path) = out.video.clone() {
        out.animated_image = palette_and_animated_image(
            transcoder,
            dir,
            &video_path,
            &palette_path,
            &opts,
            cancel,
            &mut out.failures,
        );
    }

    if opts.cleanup_frames {
        let removed = seq.remove_files();
        tracing::debug!(removed, "removed frame files");
    }

    Ok(out)
}

fn palette_and_animated_image(
    transcoder: &dyn Transcoder,
    dir: &Path,
    video: &Path,
    palette_path: &Path,
    opts: &PackageOpts,
    cancel: &CancellationToken,
    failures: &mut Vec<EncodeError>,
) -> Option<PathBuf> {
    let palette = TranscodeSpec::Palette(PaletteSpec::new(
        video,
        opts.frame_rate,
        opts.gif_size,
        palette_path,
    ));
    let palette = run_stage(transcoder, &palette, cancel, failures)?;

    let gif = TranscodeSpec::AnimatedImage(AnimatedImageSpec::new(
        video,
        palette,
        opts.frame_rate,
        opts.gif_size,
        dir.join(ANIMATED_IMAGE_FILE),
    ));
    run_stage(transcoder, &gif, cancel, failures)
}

fn run_stage(
    transcoder: &dyn Transcoder,
    spec: &TranscodeSpec,
    cancel: &CancellationToken,
    failures: &mut Vec<EncodeError>,
) -> Option<PathBuf> {
    let stage = spec.stage();
    let started = Instant::now();
    match transcoder.transcode(spec, cancel) {
        Ok(path) => {
            tracing::info!(
                %stage,
                output = %path.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "encode stage finished"
            );
            Some(path)
        }
        Err(e) => {
            tracing::warn!(%stage, error = %e, "encode stage failed");
            failures.push(e);
            None
        }
    }
}

fn validate(seq: &FrameSequence, opts: &PackageOpts) -> PanoResult<()> {
    if seq.is_empty() {
        return Err(PanoError::input("frame sequence is empty"));
    }
    if opts.frame_rate == 0 {
        return Err(PanoError::input("frame_rate must be >= 1"));
    }
    if !seq.size.is_codec_friendly() || !opts.gif_size.is_codec_friendly() {
        return Err(PanoError::input(format!(
            "video {}x{} and animated image {}x{} sizes must be positive and even",
            seq.size.width, seq.size.height, opts.gif_size.width, opts.gif_size.height
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/package.rs"]
mod tests;
