use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::foundation::core::AnimationSettings;
use crate::foundation::error::{PanoError, PanoResult};
use crate::jobs::pool::PoolConfig;

/// Runtime configuration loaded from environment variables.
///
/// Every field has a default suitable for local use.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Root directory of the local object store.
    pub store_root: PathBuf,
    /// Public URL the store root is served under.
    pub public_url: String,
    /// Parent directory of task scratch directories.
    pub scratch_root: PathBuf,
    /// Background tasks allowed to run at once.
    pub max_concurrent_jobs: usize,
    /// Per-task deadline; `None` disables it.
    pub job_deadline: Option<Duration>,
    /// Transcoder binary.
    pub ffmpeg: PathBuf,
    /// Animation defaults.
    pub animation: AnimationSettings,
}

impl Settings {
    /// Load from the process environment.
    ///
    /// | Env Var                       | Default                   |
    /// |-------------------------------|---------------------------|
    /// | `PANOREEL_STORE_ROOT`         | `./panoreel-store`        |
    /// | `PANOREEL_PUBLIC_URL`         | `http://localhost:8000`   |
    /// | `PANOREEL_SCRATCH_ROOT`       | `<tmp>/panoreel`          |
    /// | `PANOREEL_MAX_CONCURRENT_JOBS`| `2`                       |
    /// | `PANOREEL_JOB_DEADLINE_SECS`  | `600` (`0` = no deadline) |
    /// | `PANOREEL_FFMPEG`             | `ffmpeg`                  |
    /// | `PANOREEL_ANIM_FPS`           | `10`                      |
    /// | `PANOREEL_ANIM_FRAMES`        | `90`                      |
    /// | `PANOREEL_ANIM_WIDTH`         | `320`                     |
    /// | `PANOREEL_ANIM_ASPECT`        | `1.0`                     |
    /// | `PANOREEL_ANIM_FOV`           | `80.0`                    |
    /// | `PANOREEL_ANIM_GIF_SIZE`      | `200`                     |
    pub fn from_env() -> PanoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PanoResult<Self> {
        let defaults = AnimationSettings::default();
        let animation = AnimationSettings {
            frame_rate: parse(&lookup, "PANOREEL_ANIM_FPS", defaults.frame_rate)?,
            num_frames: parse(&lookup, "PANOREEL_ANIM_FRAMES", defaults.num_frames)?,
            width: parse(&lookup, "PANOREEL_ANIM_WIDTH", defaults.width)?,
            aspect_ratio: parse(&lookup, "PANOREEL_ANIM_ASPECT", defaults.aspect_ratio)?,
            fov_x: parse(&lookup, "PANOREEL_ANIM_FOV", defaults.fov_x)?,
            gif_size: Some(parse(
                &lookup,
                "PANOREEL_ANIM_GIF_SIZE",
                defaults.gif_size.unwrap_or(200),
            )?),
            ..defaults
        };
        animation
            .validate()
            .map_err(|e| PanoError::input(format!("animation settings from environment: {e}")))?;

        let max_concurrent_jobs = parse(&lookup, "PANOREEL_MAX_CONCURRENT_JOBS", 2usize)?;
        if max_concurrent_jobs == 0 {
            return Err(PanoError::input("PANOREEL_MAX_CONCURRENT_JOBS must be >= 1"));
        }
        let deadline_secs = parse(&lookup, "PANOREEL_JOB_DEADLINE_SECS", 600u64)?;

        Ok(Self {
            store_root: lookup("PANOREEL_STORE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./panoreel-store")),
            public_url: lookup("PANOREEL_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:8000".into()),
            scratch_root: lookup("PANOREEL_SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("panoreel")),
            max_concurrent_jobs,
            job_deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            ffmpeg: lookup("PANOREEL_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            animation,
        })
    }

    /// Pool limits derived from these settings.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_concurrent: self.max_concurrent_jobs,
            deadline: self.job_deadline,
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> PanoResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PanoError::input(format!("{key}='{raw}' is invalid: {e}"))),
    }
}
