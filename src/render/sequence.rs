use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::foundation::core::{AnimationSettings, FrameSize, ViewParameters, yaw_steps};
use crate::foundation::error::{PanoError, PanoResult};
use crate::foundation::math::decimal_digits;
use crate::render::sampler::render_view;
use crate::render::sphere::SphereImage;

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXT: &str = "png";
const MIN_INDEX_WIDTH: usize = 3;

/// One frame persisted in a scratch directory.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameFile {
    /// Ordinal position in the sweep, `0..len`.
    pub index: u32,
    /// Camera yaw this frame was rendered at, degrees.
    pub yaw_deg: f64,
    /// Location of the encoded frame.
    pub path: PathBuf,
}

/// Ordered set of frames produced by [`generate_sequence`].
///
/// Ordering is explicit in `frames`; file names are zero-padded wide enough for the frame count
/// so that the encoder's numbered-pattern input reads them back in the same order.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    /// Directory holding the frames.
    pub dir: PathBuf,
    /// Size of every frame.
    pub size: FrameSize,
    /// Frames in temporal order.
    pub frames: Vec<FrameFile>,
    index_width: usize,
}

impl FrameSequence {
    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Return `true` when the sequence holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Numbered-file pattern for the encoder (`frame_%03d.png` style).
    ///
    /// A literal `%` in the directory is doubled so the encoder does not read it as a directive.
    pub fn input_pattern(&self) -> PathBuf {
        let dir = match self.dir.to_str() {
            Some(s) if s.contains('%') => PathBuf::from(s.replace('%', "%%")),
            _ => self.dir.clone(),
        };
        dir.join(format!("{FRAME_PREFIX}%0{}d.{FRAME_EXT}", self.index_width))
    }

    /// Delete every frame file of this sequence. Returns how many were removed.
    pub fn remove_files(&self) -> usize {
        let mut removed = 0;
        for f in &self.frames {
            match std::fs::remove_file(&f.path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %f.path.display(), error = %e, "failed to remove frame")
                }
            }
        }
        removed
    }
}

/// Zero-padding width used for `num_frames` frames.
pub fn index_width(num_frames: u32) -> usize {
    decimal_digits(num_frames.saturating_sub(1)).max(MIN_INDEX_WIDTH)
}

/// File name of frame `index` at the given padding.
pub fn frame_file_name(index: u32, index_width: usize) -> String {
    format!("{FRAME_PREFIX}{index:0index_width$}.{FRAME_EXT}")
}

fn is_frame_file_name(name: &str) -> bool {
    name.strip_prefix(FRAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(&format!(".{FRAME_EXT}")))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Remove numbered frame files left in `dir` by an earlier run, whatever their padding.
///
/// A missing directory counts as already clear.
pub fn clear_frames(dir: &Path) -> PanoResult<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(PanoError::render(format!(
                "list scratch dir '{}': {e}",
                dir.display()
            )));
        }
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| PanoError::render(format!("list scratch dir: {e}")))?;
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_frame_file_name) {
            continue;
        }
        std::fs::remove_file(entry.path()).map_err(|e| {
            PanoError::render(format!(
                "remove stale frame '{}': {e}",
                entry.path().display()
            ))
        })?;
        removed += 1;
    }
    Ok(removed)
}

/// Load the panorama at `source` and render a full yaw sweep into `scratch_dir`.
///
/// Settings are validated before the source is touched.
pub fn generate_sequence_from_path(
    source: &Path,
    settings: &AnimationSettings,
    scratch_dir: &Path,
    cancel: &CancellationToken,
) -> PanoResult<FrameSequence> {
    settings.validate()?;
    let sphere = SphereImage::open(source)?;
    generate_sequence(&sphere, settings, scratch_dir, cancel)
}

/// Render `settings.num_frames` level views evenly spaced over `[0°, 360°)` into `scratch_dir`.
///
/// Stale frames are cleared first. Each frame is written as soon as it is rendered, so peak
/// memory is bounded by the number of render threads. On any failure every frame written by this
/// call is removed again.
#[tracing::instrument(
    skip(sphere, settings, cancel),
    fields(frames = settings.num_frames, fov = settings.fov_x, dir = %scratch_dir.display())
)]
pub fn generate_sequence(
    sphere: &SphereImage,
    settings: &AnimationSettings,
    scratch_dir: &Path,
    cancel: &CancellationToken,
) -> PanoResult<FrameSequence> {
    settings.validate()?;
    let size = settings.frame_size()?;
    let yaws = yaw_steps(settings.num_frames)?;
    let views: Vec<ViewParameters> = yaws
        .iter()
        .map(|&yaw| ViewParameters::level(yaw, settings.fov_x, size, settings.sampling))
        .collect();
    for v in &views {
        v.validate()?;
    }

    std::fs::create_dir_all(scratch_dir).map_err(|e| {
        PanoError::render(format!(
            "create scratch dir '{}': {e}",
            scratch_dir.display()
        ))
    })?;
    let stale = clear_frames(scratch_dir)?;
    if stale > 0 {
        tracing::debug!(stale, "cleared stale frames");
    }

    let width = index_width(settings.num_frames);
    let frames: Vec<FrameFile> = yaws
        .iter()
        .enumerate()
        .map(|(i, &yaw_deg)| FrameFile {
            index: i as u32,
            yaw_deg,
            path: scratch_dir.join(frame_file_name(i as u32, width)),
        })
        .collect();

    let pool = build_thread_pool(settings.threads)?;
    let result: PanoResult<()> = pool.install(|| {
        frames
            .par_iter()
            .zip(views.par_iter())
            .try_for_each(|(frame, view)| {
                if cancel.is_cancelled() {
                    return Err(PanoError::cancelled("frame rendering cancelled"));
                }
                let img = render_view(sphere, view)?;
                img.save_with_format(&frame.path, image::ImageFormat::Png)
                    .map_err(|e| {
                        PanoError::render(format!(
                            "write frame {} to '{}': {e}",
                            frame.index,
                            frame.path.display()
                        ))
                    })
            })
    });

    let seq = FrameSequence {
        dir: scratch_dir.to_path_buf(),
        size,
        frames,
        index_width: width,
    };

    if let Err(e) = result {
        seq.remove_files();
        return Err(e);
    }

    tracing::debug!(
        width = size.width,
        height = size.height,
        "frame sequence written"
    );
    Ok(seq)
}

fn build_thread_pool(threads: Option<usize>) -> PanoResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(PanoError::input("render threads must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PanoError::render(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/sequence.rs"]
mod tests;
