use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "panoreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a 360° yaw sweep of perspective frames into a directory.
    Frames(FramesArgs),
    /// Render frames and encode them into animation.mp4 + animation.gif (requires `ffmpeg`).
    Animate(AnimateArgs),
    /// Publish a panorama into the local object store and run its background tasks.
    Publish(PublishArgs),
}

/// Sweep parameters; unset flags fall back to the `PANOREEL_ANIM_*` environment defaults.
#[derive(Args, Debug)]
struct SweepArgs {
    /// Number of frames in one full turn.
    #[arg(long)]
    frames: Option<u32>,

    /// Frame width in pixels (rounded down to even).
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels; derives the width from the aspect ratio when set.
    #[arg(long)]
    height: Option<u32>,

    /// Width/height ratio of the frames.
    #[arg(long)]
    aspect: Option<f64>,

    /// Horizontal field of view in degrees, inside (0, 180).
    #[arg(long)]
    fov: Option<f64>,

    /// Nearest-neighbour sampling instead of bilinear.
    #[arg(long)]
    nearest: bool,

    /// Rendering threads (defaults to one per core).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct FramesArgs {
    /// Equirectangular source image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory for `frame_NNN.png` files.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    sweep: SweepArgs,
}

#[derive(Parser, Debug)]
struct AnimateArgs {
    /// Equirectangular source image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory; frames and both artifacts are written here.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    sweep: SweepArgs,

    /// Frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Animated-image height in pixels.
    #[arg(long)]
    gif_size: Option<u32>,

    /// Keep the frame files after encoding.
    #[arg(long)]
    keep_frames: bool,
}

#[derive(Parser, Debug)]
struct PublishArgs {
    /// Equirectangular image to publish.
    #[arg(long)]
    image: PathBuf,

    /// Companion depth image.
    #[arg(long)]
    depth: Option<PathBuf>,

    /// Prompt the image was generated from.
    #[arg(long, default_value = "")]
    prompt: String,

    /// JSON object of generation parameters, stored in the metadata record.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Generation workflow JSON, stored as `workflow.json`.
    #[arg(long)]
    workflow: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "panoreel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = panoreel::Settings::from_env()?;
    match cli.cmd {
        Command::Frames(args) => cmd_frames(args, &settings),
        Command::Animate(args) => cmd_animate(args, &settings),
        Command::Publish(args) => cmd_publish(args, settings),
    }
}

fn sweep_settings(sweep: &SweepArgs, base: &panoreel::AnimationSettings) -> panoreel::AnimationSettings {
    panoreel::AnimationSettings {
        num_frames: sweep.frames.unwrap_or(base.num_frames),
        width: sweep.width.unwrap_or(base.width),
        height: sweep.height.or(base.height),
        aspect_ratio: sweep.aspect.unwrap_or(base.aspect_ratio),
        fov_x: sweep.fov.unwrap_or(base.fov_x),
        sampling: if sweep.nearest {
            panoreel::SamplingMode::Nearest
        } else {
            base.sampling
        },
        threads: sweep.threads.or(base.threads),
        ..base.clone()
    }
}

fn cmd_frames(args: FramesArgs, settings: &panoreel::Settings) -> anyhow::Result<()> {
    let anim = sweep_settings(&args.sweep, &settings.animation);
    let seq = panoreel::generate_sequence_from_path(
        &args.in_path,
        &anim,
        &args.out_dir,
        &CancellationToken::new(),
    )?;
    eprintln!(
        "wrote {} frames ({}x{}) to {}",
        seq.len(),
        seq.size.width,
        seq.size.height,
        args.out_dir.display()
    );
    Ok(())
}

fn cmd_animate(args: AnimateArgs, settings: &panoreel::Settings) -> anyhow::Result<()> {
    let transcoder = panoreel::FfmpegTranscoder::new(&settings.ffmpeg);
    if !transcoder.is_available() {
        anyhow::bail!(
            "'{}' is not runnable; install ffmpeg or set PANOREEL_FFMPEG",
            settings.ffmpeg.display()
        );
    }

    let anim = panoreel::AnimationSettings {
        frame_rate: args.fps.unwrap_or(settings.animation.frame_rate),
        gif_size: args.gif_size.or(settings.animation.gif_size),
        cleanup_frames: !args.keep_frames,
        ..sweep_settings(&args.sweep, &settings.animation)
    };
    let cancel = CancellationToken::new();
    let seq = panoreel::generate_sequence_from_path(&args.in_path, &anim, &args.out_dir, &cancel)?;
    let opts = panoreel::PackageOpts {
        frame_rate: anim.frame_rate,
        gif_size: anim.gif_frame_size()?,
        cleanup_frames: anim.cleanup_frames,
    };
    let out = panoreel::assemble(&transcoder, &seq, opts, &cancel)?;

    for failure in &out.failures {
        eprintln!("warning: {failure}");
    }
    let video = out.video.context("video stage failed; no artifacts written")?;
    eprintln!("wrote {}", video.display());
    if let Some(gif) = out.animated_image {
        eprintln!("wrote {}", gif.display());
    }
    Ok(())
}

fn cmd_publish(args: PublishArgs, settings: panoreel::Settings) -> anyhow::Result<()> {
    let parameters = match &args.params {
        Some(path) => match read_json(path)? {
            serde_json::Value::Object(map) => map,
            _ => anyhow::bail!("'{}' must contain a JSON object", path.display()),
        },
        None => serde_json::Map::new(),
    };
    let workflow = args.workflow.as_deref().map(read_json).transpose()?;

    let request = panoreel::PublishRequest {
        image_path: args.image,
        depth_path: args.depth,
        prompt: args.prompt,
        parameters,
        workflow,
    };

    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    runtime.block_on(async move {
        let (pool, mut reports) = panoreel::TaskPool::new(settings.pool_config())?;
        let services = panoreel::PublishServices {
            store: Arc::new(panoreel::LocalObjectStore::new(
                &settings.store_root,
                &settings.public_url,
            )),
            transcoder: Arc::new(panoreel::FfmpegTranscoder::new(&settings.ffmpeg)),
            embedder: Arc::new(panoreel::HistogramEmbedder::default()),
            pool: pool.clone(),
            scratch_root: settings.scratch_root.clone(),
            animation: settings.animation.clone(),
        };

        let response = panoreel::publish(&request, &services).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);

        pool.shutdown().await;
        while let Ok(report) = reports.try_recv() {
            eprintln!(
                "{} {}: {:?} in {}ms ({})",
                report.kind,
                report.content_hash,
                report.state,
                report.elapsed_ms,
                report.detail.as_deref().unwrap_or("")
            );
        }
        anyhow::Ok(())
    })
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let f = File::open(path).with_context(|| format!("open '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parse JSON '{}'", path.display()))
}
