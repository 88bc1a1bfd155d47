use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::encode::transcode::{
    AnimatedImageSpec, Dither, EncodeError, PaletteSpec, ScaleFilter, StatsMode, TranscodeSpec,
    Transcoder, VideoSpec,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// [`Transcoder`] backed by the system `ffmpeg` binary.
///
/// Arguments are passed as a vector, never through a shell, so paths need no quoting.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    /// Use the `ffmpeg` found at `binary` (a bare name is looked up on `PATH`).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Binary this transcoder invokes.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Return `true` when the configured binary can be invoked.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    FfmpegTranscoder::default().is_available()
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(
        &self,
        spec: &TranscodeSpec,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, EncodeError> {
        let stage = spec.stage();
        spec.check_inputs()?;
        if cancel.is_cancelled() {
            return Err(EncodeError::Cancelled { stage });
        }

        let mut child = Command::new(&self.binary)
            .args(ffmpeg_args(spec))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EncodeError::Spawn { stage, source })?;

        // Drain stderr concurrently so a chatty child never blocks on a full pipe.
        let stderr_drain = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut bytes = Vec::new();
                let _ = stderr.read_to_end(&mut bytes);
                bytes
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EncodeError::Cancelled { stage });
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(source) => return Err(EncodeError::Spawn { stage, source }),
            }
        };

        let stderr = stderr_drain
            .and_then(|h| h.join().ok())
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .unwrap_or_default();

        if !status.success() {
            return Err(EncodeError::Failed {
                stage,
                exit_code: status.code(),
                stderr,
            });
        }

        let output = spec.output().to_path_buf();
        if !output.is_file() {
            return Err(EncodeError::MissingOutput {
                stage,
                path: output,
            });
        }
        Ok(output)
    }
}

/// Full `ffmpeg` argument vector for `spec`.
pub fn ffmpeg_args(spec: &TranscodeSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect();
    match spec {
        TranscodeSpec::Video(s) => push_video_args(&mut args, s),
        TranscodeSpec::Palette(s) => push_palette_args(&mut args, s),
        TranscodeSpec::AnimatedImage(s) => push_animated_image_args(&mut args, s),
    }
    args
}

fn push_video_args(args: &mut Vec<OsString>, s: &VideoSpec) {
    args.push("-framerate".into());
    args.push(s.frame_rate.to_string().into());
    args.push("-i".into());
    args.push(s.input_pattern.clone().into_os_string());
    args.push("-c:v".into());
    args.push(s.codec.into());
    args.push("-pix_fmt".into());
    args.push(s.pixel_format.into());
    args.push("-crf".into());
    args.push(s.crf.to_string().into());
    args.push("-vf".into());
    args.push(format!("scale={}:{}", s.size.width, s.size.height).into());
    args.push(s.output.clone().into_os_string());
}

fn push_palette_args(args: &mut Vec<OsString>, s: &PaletteSpec) {
    let filter = format!(
        "fps={},{},palettegen=max_colors={}:stats_mode={}",
        s.frame_rate,
        scale_filter(s.size.width, s.size.height, s.scale_filter),
        s.max_colors,
        stats_mode(s.stats_mode),
    );
    args.push("-i".into());
    args.push(s.input.clone().into_os_string());
    args.push("-vf".into());
    args.push(filter.into());
    args.push(s.output.clone().into_os_string());
}

fn push_animated_image_args(args: &mut Vec<OsString>, s: &AnimatedImageSpec) {
    let filter = format!(
        "fps={},{}[x];[x][1:v]paletteuse={}",
        s.frame_rate,
        scale_filter(s.size.width, s.size.height, s.scale_filter),
        paletteuse_opts(s.dither),
    );
    args.push("-i".into());
    args.push(s.input.clone().into_os_string());
    args.push("-i".into());
    args.push(s.palette.clone().into_os_string());
    args.push("-lavfi".into());
    args.push(filter.into());
    args.push("-loop".into());
    args.push(s.loop_count.to_string().into());
    args.push(s.output.clone().into_os_string());
}

fn scale_filter(width: u32, height: u32, filter: ScaleFilter) -> String {
    let flags = match filter {
        ScaleFilter::Lanczos => "lanczos",
        ScaleFilter::Bicubic => "bicubic",
    };
    format!("scale={width}:{height}:flags={flags}")
}

fn stats_mode(mode: StatsMode) -> &'static str {
    match mode {
        StatsMode::Full => "full",
        StatsMode::Single => "single",
    }
}

fn paletteuse_opts(dither: Dither) -> String {
    match dither {
        Dither::Bayer { scale } => {
            format!("dither=bayer:bayer_scale={}:diff_mode=rectangle", scale.min(5))
        }
        Dither::None => "dither=none:diff_mode=rectangle".to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
