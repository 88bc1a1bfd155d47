//! panoreel turns equirectangular panoramas into rotating fly-through animations.
//!
//! The pipeline is split the same way at every level:
//!
//! - [`render`] projects the panorama into perspective frames for a 360° yaw sweep
//! - [`encode`] turns the frame sequence into a video and a palette-optimised animated image
//! - [`jobs`] runs that as a bounded, deadline-aware background task that uploads its artifacts
//! - [`publish`] is the triggering event that also starts the sibling [`embed`] task
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod foundation;

/// Environment configuration.
pub mod config;
/// Image/text embeddings.
pub mod embed;
/// Frame sequence encoding.
pub mod encode;
/// Background tasks.
pub mod jobs;
/// Publishing generated panoramas.
pub mod publish;
/// Panorama projection and frame sequences.
pub mod render;
/// Artifact storage.
pub mod storage;

pub use crate::foundation::core::{
    AnimationSettings, FrameSize, SamplingMode, ViewParameters, resolve_gif_size,
    resolve_output_size, validate_fov, yaw_steps,
};
pub use crate::foundation::error::{PanoError, PanoResult};

pub use crate::config::Settings;
pub use crate::embed::encoder::{Embedder, HistogramEmbedder};
pub use crate::encode::ffmpeg::{FfmpegTranscoder, is_ffmpeg_on_path};
pub use crate::encode::package::{Assembled, PackageOpts, assemble};
pub use crate::encode::scripted::ScriptedTranscoder;
pub use crate::encode::transcode::{EncodeError, Stage, TranscodeSpec, Transcoder};
pub use crate::jobs::animation::{AnimationJob, AnimationOutcome, launch_animation, run_animation};
pub use crate::jobs::pool::{JobState, PoolConfig, TaskHandle, TaskKind, TaskPool, TaskReport};
pub use crate::publish::flow::{PublishRequest, PublishResponse, PublishServices, publish};
pub use crate::render::sampler::render_view;
pub use crate::render::sequence::{FrameSequence, generate_sequence, generate_sequence_from_path};
pub use crate::render::sphere::SphereImage;
pub use crate::storage::local::LocalObjectStore;
pub use crate::storage::memory::InMemoryStore;
pub use crate::storage::store::{ObjectStore, StorageError};
