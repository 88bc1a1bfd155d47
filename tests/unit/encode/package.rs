use super::*;
use crate::encode::scripted::ScriptedTranscoder;
use crate::encode::transcode::Stage;
use crate::foundation::core::AnimationSettings;
use crate::render::sequence::generate_sequence;
use crate::render::sphere::SphereImage;
use image::{Rgb, RgbImage};

fn sequence(dir: &Path) -> FrameSequence {
    let sphere = SphereImage::from_rgb(RgbImage::from_pixel(64, 32, Rgb([9, 8, 7]))).unwrap();
    let settings = AnimationSettings {
        num_frames: 4,
        width: 8,
        threads: Some(1),
        ..AnimationSettings::default()
    };
    generate_sequence(&sphere, &settings, dir, &CancellationToken::new()).unwrap()
}

fn opts(cleanup_frames: bool) -> PackageOpts {
    PackageOpts {
        frame_rate: 10,
        gif_size: FrameSize::new(4, 4),
        cleanup_frames,
    }
}

#[test]
fn all_stages_run_in_order_and_palette_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let t = ScriptedTranscoder::new();

    let out = assemble(&t, &seq, opts(false), &CancellationToken::new()).unwrap();

    assert!(out.is_complete());
    assert!(out.failures.is_empty());
    assert_eq!(out.video.as_deref(), Some(dir.path().join(VIDEO_FILE).as_path()));
    assert_eq!(
        out.animated_image.as_deref(),
        Some(dir.path().join(ANIMATED_IMAGE_FILE).as_path())
    );
    assert!(!dir.path().join(PALETTE_FILE).exists());
    assert_eq!(
        t.stages(),
        vec![Stage::Video, Stage::Palette, Stage::AnimatedImage]
    );
    assert!(seq.frames.iter().all(|f| f.path.exists()));
}

#[test]
fn video_stage_receives_sequence_pattern_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let t = ScriptedTranscoder::new();
    assemble(&t, &seq, opts(false), &CancellationToken::new()).unwrap();

    let TranscodeSpec::Video(video) = &t.calls()[0] else {
        panic!("first call must be the video stage");
    };
    assert_eq!(video.input_pattern, seq.input_pattern());
    assert_eq!(video.size, FrameSize::new(8, 8));
    assert_eq!(video.frame_rate, 10);

    let TranscodeSpec::Palette(palette) = &t.calls()[1] else {
        panic!("second call must be the palette stage");
    };
    assert_eq!(palette.size, FrameSize::new(4, 4));
    assert_eq!(palette.input, dir.path().join(VIDEO_FILE));
}

#[test]
fn palette_failure_keeps_video_and_drops_animated_image() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let t = ScriptedTranscoder::new().failing(Stage::Palette);

    let out = assemble(&t, &seq, opts(true), &CancellationToken::new()).unwrap();

    assert!(out.video.is_some());
    assert!(out.animated_image.is_none());
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].stage(), Stage::Palette);
    assert_eq!(t.stages(), vec![Stage::Video, Stage::Palette]);
    assert!(!dir.path().join(PALETTE_FILE).exists());
}

#[test]
fn animated_image_failure_still_removes_palette() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let t = ScriptedTranscoder::new().failing(Stage::AnimatedImage);

    let out = assemble(&t, &seq, opts(false), &CancellationToken::new()).unwrap();

    assert!(out.video.is_some());
    assert!(out.animated_image.is_none());
    assert!(!dir.path().join(PALETTE_FILE).exists());
}

#[test]
fn video_failure_skips_dependent_stages() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let t = ScriptedTranscoder::new().failing(Stage::Video);

    let out = assemble(&t, &seq, opts(false), &CancellationToken::new()).unwrap();

    assert!(out.video.is_none());
    assert!(out.animated_image.is_none());
    assert_eq!(t.stages(), vec![Stage::Video]);
    assert!(!dir.path().join(PALETTE_FILE).exists());
}

#[test]
fn stale_palette_is_removed_when_video_fails() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let palette = dir.path().join(PALETTE_FILE);
    std::fs::write(&palette, b"left over from an interrupted run").unwrap();
    let t = ScriptedTranscoder::new().failing(Stage::Video);

    let out = assemble(&t, &seq, opts(false), &CancellationToken::new()).unwrap();

    assert!(out.video.is_none());
    assert!(!palette.exists());
}

#[test]
fn stale_palette_is_removed_on_invalid_options() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let palette = dir.path().join(PALETTE_FILE);
    std::fs::write(&palette, b"stale").unwrap();

    let bad_rate = PackageOpts {
        frame_rate: 0,
        ..opts(false)
    };
    assert!(assemble(&ScriptedTranscoder::new(), &seq, bad_rate, &CancellationToken::new()).is_err());
    assert!(!palette.exists());
}

#[test]
fn missing_output_counts_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let t = ScriptedTranscoder::new().without_output(Stage::AnimatedImage);

    let out = assemble(&t, &seq, opts(false), &CancellationToken::new()).unwrap();
    assert!(out.animated_image.is_none());
    assert!(matches!(
        out.failures[0],
        EncodeError::MissingOutput {
            stage: Stage::AnimatedImage,
            ..
        }
    ));
}

#[test]
fn cleanup_frames_removes_frame_files() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let out = assemble(
        &ScriptedTranscoder::new(),
        &seq,
        opts(true),
        &CancellationToken::new(),
    )
    .unwrap();
    assert!(out.is_complete());
    assert!(seq.frames.iter().all(|f| !f.path.exists()));
}

#[test]
fn invalid_options_are_input_errors() {
    let dir = tempfile::tempdir().unwrap();
    let seq = sequence(dir.path());
    let t = ScriptedTranscoder::new();

    let bad_rate = PackageOpts {
        frame_rate: 0,
        ..opts(false)
    };
    assert!(
        assemble(&t, &seq, bad_rate, &CancellationToken::new())
            .unwrap_err()
            .is_input()
    );

    let odd_gif = PackageOpts {
        gif_size: FrameSize::new(5, 4),
        ..opts(false)
    };
    assert!(
        assemble(&t, &seq, odd_gif, &CancellationToken::new())
            .unwrap_err()
            .is_input()
    );
    assert!(t.calls().is_empty());
}
