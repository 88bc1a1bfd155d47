use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::encode::package::{ANIMATED_IMAGE_FILE, Assembled, PackageOpts, VIDEO_FILE, assemble};
use crate::encode::transcode::Transcoder;
use crate::foundation::core::{AnimationSettings, FrameSize};
use crate::foundation::error::{PanoError, PanoResult};
use crate::jobs::pool::{TaskHandle, TaskKind, TaskPool};
use crate::jobs::scratch::{ScratchDir, task_scratch_path};
use crate::render::sequence::generate_sequence_from_path;
use crate::storage::store::{ObjectStore, object_key, upload_or_existing};

/// Scratch directory suffix of animation jobs.
pub const ANIMATION_SUFFIX: &str = "animation";

/// One fly-through animation of a published panorama.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationJob {
    /// Record the artifacts belong to.
    pub content_hash: String,
    /// Equirectangular source; only ever read.
    pub source_image_path: PathBuf,
    /// Directory owned by the job while it runs.
    pub scratch_dir: PathBuf,
    /// Rendering and encoding parameters.
    pub settings: AnimationSettings,
    /// Resolved frame and video size.
    pub output_size: FrameSize,
    /// Resolved animated-image size.
    pub gif_size: FrameSize,
}

impl AnimationJob {
    /// Validate `settings`, resolve sizes and place the scratch dir under `scratch_root`.
    pub fn new(
        content_hash: impl Into<String>,
        source_image_path: impl Into<PathBuf>,
        scratch_root: &Path,
        settings: AnimationSettings,
    ) -> PanoResult<Self> {
        let content_hash = content_hash.into();
        settings.validate()?;
        let scratch_dir = task_scratch_path(scratch_root, &content_hash, ANIMATION_SUFFIX)?;
        Ok(Self {
            output_size: settings.frame_size()?,
            gif_size: settings.gif_frame_size()?,
            content_hash,
            source_image_path: source_image_path.into(),
            scratch_dir,
            settings,
        })
    }

    fn package_opts(&self) -> PackageOpts {
        PackageOpts {
            frame_rate: self.settings.frame_rate,
            gif_size: self.gif_size,
            cleanup_frames: self.settings.cleanup_frames,
        }
    }
}

/// What an animation job produced.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct AnimationOutcome {
    /// Uploaded video URL; `None` if the upload failed.
    pub video_url: Option<String>,
    /// Uploaded animated-image URL; `None` if it was not produced or not uploaded.
    pub animated_image_url: Option<String>,
    /// Encode stage failures that did not prevent the video.
    pub encode_failures: Vec<String>,
}

impl AnimationOutcome {
    /// One-line summary for task reports.
    pub fn summary(&self) -> String {
        format!(
            "video={} animated_image={} encode_failures={}",
            self.video_url.as_deref().unwrap_or("-"),
            self.animated_image_url.as_deref().unwrap_or("-"),
            self.encode_failures.len()
        )
    }
}

/// Run one animation job to completion: frames, encode, upload.
///
/// Fails when frames cannot be generated or no video comes out of the encoder. A missing animated
/// image and upload failures are logged and reflected in the outcome only. The scratch directory
/// is removed on every path out of this function.
pub async fn run_animation(
    job: AnimationJob,
    transcoder: Arc<dyn Transcoder>,
    store: Arc<dyn ObjectStore>,
    cancel: CancellationToken,
) -> PanoResult<AnimationOutcome> {
    let started = Instant::now();
    let hash = job.content_hash.clone();
    tracing::info!(
        content_hash = %hash,
        source = %job.source_image_path.display(),
        frames = job.settings.num_frames,
        width = job.output_size.width,
        height = job.output_size.height,
        "animation job started"
    );

    let scratch = ScratchDir::create(&job.scratch_dir)?;
    // Frame rendering and the transcoder block, so they run off the async workers. The guard
    // travels with the blocking work and is dropped wherever that work ends.
    let (scratch, assembled) = tokio::task::spawn_blocking(move || {
        let assembled = render_and_package(&job, scratch.path(), transcoder.as_ref(), &cancel);
        (scratch, assembled)
    })
    .await
    .map_err(|e| PanoError::Other(anyhow::anyhow!("animation worker panicked: {e}")))?;
    let assembled = assembled?;

    let Some(video) = assembled.video.as_deref() else {
        return Err(match assembled.failures.into_iter().next() {
            Some(e) => PanoError::Encode(e),
            None => PanoError::render("encoder produced no video"),
        });
    };

    let video_url = upload_or_existing(store.as_ref(), &object_key(&hash, VIDEO_FILE), video).await;
    let animated_image_url = match assembled.animated_image.as_deref() {
        Some(path) => {
            upload_or_existing(store.as_ref(), &object_key(&hash, ANIMATED_IMAGE_FILE), path).await
        }
        None => None,
    };
    drop(scratch);

    let outcome = AnimationOutcome {
        video_url,
        animated_image_url,
        encode_failures: assembled.failures.iter().map(ToString::to_string).collect(),
    };
    tracing::info!(
        content_hash = %hash,
        elapsed_ms = started.elapsed().as_millis() as u64,
        summary = %outcome.summary(),
        "animation job finished"
    );
    Ok(outcome)
}

fn render_and_package(
    job: &AnimationJob,
    dir: &Path,
    transcoder: &dyn Transcoder,
    cancel: &CancellationToken,
) -> PanoResult<Assembled> {
    let seq = generate_sequence_from_path(&job.source_image_path, &job.settings, dir, cancel)?;
    tracing::debug!(content_hash = %job.content_hash, frames = seq.len(), "frames rendered");
    assemble(transcoder, &seq, job.package_opts(), cancel)
}

/// Start `job` on `pool` without waiting for it.
pub fn launch_animation(
    pool: &TaskPool,
    job: AnimationJob,
    transcoder: Arc<dyn Transcoder>,
    store: Arc<dyn ObjectStore>,
) -> TaskHandle {
    let hash = job.content_hash.clone();
    pool.spawn(TaskKind::Animation, hash, move |cancel| async move {
        run_animation(job, transcoder, store, cancel)
            .await
            .map(|outcome| outcome.summary())
    })
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/animation.rs"]
mod tests;
