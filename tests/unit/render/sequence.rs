use super::*;
use image::{Rgb, RgbImage};

fn small_sphere() -> SphereImage {
    let img = RgbImage::from_fn(128, 64, |x, y| Rgb([(x * 2) as u8, (y * 4) as u8, 90]));
    SphereImage::from_rgb(img).unwrap()
}

fn settings(num_frames: u32) -> AnimationSettings {
    AnimationSettings {
        num_frames,
        width: 16,
        aspect_ratio: 1.0,
        fov_x: 70.0,
        threads: Some(2),
        ..AnimationSettings::default()
    }
}

fn frame_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| is_frame_file_name(n))
        .collect();
    names.sort();
    names
}

#[test]
fn writes_one_numbered_file_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let seq = generate_sequence(
        &small_sphere(),
        &settings(12),
        dir.path(),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(seq.len(), 12);
    assert_eq!(seq.size, FrameSize::new(16, 16));
    let names = frame_names(dir.path());
    assert_eq!(names.len(), 12);
    assert_eq!(names.first().map(String::as_str), Some("frame_000.png"));
    assert_eq!(names.last().map(String::as_str), Some("frame_011.png"));

    for (k, f) in seq.frames.iter().enumerate() {
        assert_eq!(f.index, k as u32);
        assert_eq!(f.yaw_deg, 30.0 * k as f64);
        let img = image::open(&f.path).unwrap();
        assert_eq!((img.width(), img.height()), (16, 16));
    }
}

#[test]
fn rerun_leaves_no_stale_frames() {
    let dir = tempfile::tempdir().unwrap();
    for stale in ["frame_0099.png", "frame_12.png", "frame_005.png"] {
        std::fs::write(dir.path().join(stale), b"stale").unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();
    std::fs::write(dir.path().join("frame_final.png"), b"not a frame").unwrap();

    let token = CancellationToken::new();
    generate_sequence(&small_sphere(), &settings(8), dir.path(), &token).unwrap();
    generate_sequence(&small_sphere(), &settings(3), dir.path(), &token).unwrap();

    assert_eq!(
        frame_names(dir.path()),
        vec!["frame_000.png", "frame_001.png", "frame_002.png"]
    );
    assert!(dir.path().join("notes.txt").exists());
    assert!(dir.path().join("frame_final.png").exists());
}

#[test]
fn single_frame_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let seq = generate_sequence(
        &small_sphere(),
        &settings(1),
        dir.path(),
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(seq.len(), 1);
    assert_eq!(seq.frames[0].yaw_deg, 0.0);
}

#[test]
fn portrait_frames_round_to_even() {
    let dir = tempfile::tempdir().unwrap();
    let s = AnimationSettings {
        width: 64,
        aspect_ratio: 9.0 / 16.0,
        ..settings(2)
    };
    let seq = generate_sequence(&small_sphere(), &s, dir.path(), &CancellationToken::new()).unwrap();
    assert_eq!(seq.size, FrameSize::new(64, 112));
}

#[test]
fn index_width_grows_with_frame_count() {
    assert_eq!(index_width(1), 3);
    assert_eq!(index_width(1000), 3);
    assert_eq!(index_width(1001), 4);
    assert_eq!(frame_file_name(7, 3), "frame_007.png");
    assert_eq!(frame_file_name(1234, 4), "frame_1234.png");
}

#[test]
fn input_pattern_matches_padding() {
    let dir = tempfile::tempdir().unwrap();
    let seq = generate_sequence(
        &small_sphere(),
        &settings(2),
        dir.path(),
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(seq.input_pattern(), dir.path().join("frame_%03d.png"));
}

#[test]
fn input_pattern_escapes_percent_in_directory() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("100%_done");
    let seq = generate_sequence(&small_sphere(), &settings(2), &dir, &CancellationToken::new())
        .unwrap();
    assert!(seq.frames.iter().all(|f| f.path.starts_with(&dir)));
    assert_eq!(
        seq.input_pattern(),
        root.path().join("100%%_done").join("frame_%03d.png")
    );
}

#[test]
fn invalid_fov_is_rejected_before_anything_is_written() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("never-created");
    for fov in [0.0, 180.0, -1.0] {
        let s = AnimationSettings {
            fov_x: fov,
            ..settings(4)
        };
        let err = generate_sequence(&small_sphere(), &s, &dir, &CancellationToken::new())
            .unwrap_err();
        assert!(err.is_input());
    }
    assert!(!dir.exists());
}

#[test]
fn cancelled_sweep_leaves_no_frames() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let err = generate_sequence(&small_sphere(), &settings(6), dir.path(), &token).unwrap_err();
    assert!(matches!(err, PanoError::Cancelled(_)));
    assert!(frame_names(dir.path()).is_empty());
}

#[test]
fn missing_or_corrupt_source_aborts_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();

    let missing = dir.path().join("nope.png");
    let err =
        generate_sequence_from_path(&missing, &settings(4), &dir.path().join("f"), &token)
            .unwrap_err();
    assert!(err.is_input());

    let corrupt = dir.path().join("corrupt.png");
    std::fs::write(&corrupt, b"definitely not a png").unwrap();
    let err =
        generate_sequence_from_path(&corrupt, &settings(4), &dir.path().join("f"), &token)
            .unwrap_err();
    assert!(matches!(err, PanoError::Render(_)));
    assert!(!dir.path().join("f").exists());
}
