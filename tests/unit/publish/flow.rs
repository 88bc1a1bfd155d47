use super::*;
use crate::embed::encoder::HistogramEmbedder;
use crate::encode::scripted::ScriptedTranscoder;
use crate::jobs::pool::{JobState, PoolConfig, TaskReport};
use crate::publish::hash::content_hash;
use crate::storage::memory::InMemoryStore;
use image::{Rgb, RgbImage};
use tokio::sync::mpsc::UnboundedReceiver;

struct Env {
    _dir: tempfile::TempDir,
    image: PathBuf,
    depth: PathBuf,
    scratch_root: PathBuf,
    store: Arc<InMemoryStore>,
    services: PublishServices,
    reports: UnboundedReceiver<TaskReport>,
}

fn env() -> Env {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("pano.png");
    RgbImage::from_fn(64, 32, |x, y| Rgb([(x * 3) as u8, (y * 7) as u8, 50]))
        .save(&image)
        .unwrap();
    let depth = dir.path().join("depth.png");
    RgbImage::from_pixel(64, 32, Rgb([128, 128, 128]))
        .save(&depth)
        .unwrap();
    let scratch_root = dir.path().join("scratch");
    std::fs::create_dir(&scratch_root).unwrap();

    let store = Arc::new(InMemoryStore::default());
    let (pool, reports) = TaskPool::new(PoolConfig::default()).unwrap();
    let services = PublishServices {
        store: store.clone(),
        transcoder: Arc::new(ScriptedTranscoder::new()),
        embedder: Arc::new(HistogramEmbedder::default()),
        pool,
        scratch_root: scratch_root.clone(),
        animation: AnimationSettings {
            num_frames: 4,
            width: 16,
            gif_size: Some(8),
            threads: Some(1),
            ..AnimationSettings::default()
        },
    };
    Env {
        _dir: dir,
        image,
        depth,
        scratch_root,
        store,
        services,
        reports,
    }
}

fn request(env: &Env) -> PublishRequest {
    let mut parameters = serde_json::Map::new();
    parameters.insert("seed".into(), serde_json::json!(42));
    parameters.insert("cfg".into(), serde_json::json!(3.5));
    PublishRequest {
        image_path: env.image.clone(),
        depth_path: Some(env.depth.clone()),
        prompt: "Magical pizza kingdom".into(),
        parameters,
        workflow: Some(serde_json::json!({"5": {"inputs": {"width": 2048}}})),
    }
}

#[tokio::test]
async fn publish_uploads_record_then_background_artifacts() {
    let mut env = env();
    let req = request(&env);

    let resp = publish(&req, &env.services).await.unwrap();
    let id = content_hash(&std::fs::read(&env.image).unwrap());
    assert_eq!(resp.id, id);
    assert_eq!(
        resp.image_url.as_deref(),
        Some(format!("memory://panoreel/{id}/image.png").as_str())
    );
    assert!(resp.depth_url.is_some());
    assert!(resp.metadata_url.is_some());

    env.services.pool.shutdown().await;

    let mut keys = env.store.keys();
    keys.iter_mut().for_each(|k| *k = k.trim_start_matches(&format!("{id}/")).to_string());
    assert_eq!(
        keys,
        vec![
            "animation.gif",
            "animation.mp4",
            "depth.png",
            "depth_thumbnail.webp",
            "embedding.json",
            "image.png",
            "image_thumbnail.webp",
            "metadata.json",
            "workflow.json",
        ]
    );

    let mut states = Vec::new();
    while let Ok(r) = env.reports.try_recv() {
        states.push((r.kind, r.state));
    }
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|(_, s)| *s == JobState::Completed));

    assert_eq!(std::fs::read_dir(&env.scratch_root).unwrap().count(), 0);
}

#[tokio::test]
async fn metadata_carries_parameters_and_urls() {
    let env = env();
    let resp = publish(&request(&env), &env.services).await.unwrap();
    env.services.pool.shutdown().await;

    let stored = env
        .store
        .get(&format!("{}/metadata.json", resp.id))
        .unwrap();
    let meta: Metadata = serde_json::from_slice(&stored.bytes).unwrap();
    assert_eq!(meta.id, resp.id);
    assert_eq!(meta.prompt, "Magical pizza kingdom");
    assert_eq!(meta.parameters["seed"], serde_json::json!(42));
    assert_eq!(meta.image_url, resp.image_url);
    assert!(meta.thumbnail_url.unwrap().ends_with("/image_thumbnail.webp"));
    assert!(meta.workflow_url.unwrap().ends_with("/workflow.json"));
}

#[tokio::test]
async fn republishing_reuses_existing_urls() {
    let env = env();
    let first = publish(&request(&env), &env.services).await.unwrap();
    env.services.pool.shutdown().await;
    let second = publish(&request(&env), &env.services).await.unwrap();
    env.services.pool.shutdown().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn invalid_requests_upload_nothing() {
    let env = env();

    let mut missing = request(&env);
    missing.image_path = env.scratch_root.join("nope.png");
    assert!(publish(&missing, &env.services).await.unwrap_err().is_input());

    let mut wrong_ext = request(&env);
    wrong_ext.depth_path = Some(env.scratch_root.join("depth.exr"));
    assert!(publish(&wrong_ext, &env.services).await.unwrap_err().is_input());

    assert!(env.store.keys().is_empty());
    assert_eq!(env.services.pool.in_flight(), 0);
}

#[tokio::test]
async fn without_depth_or_workflow_only_image_records_are_written() {
    let env = env();
    let req = PublishRequest {
        depth_path: None,
        workflow: None,
        ..request(&env)
    };
    let resp = publish(&req, &env.services).await.unwrap();
    env.services.pool.shutdown().await;

    assert!(resp.depth_url.is_none());
    let keys = env.store.keys();
    assert!(!keys.iter().any(|k| k.contains("depth") || k.contains("workflow")));
    assert!(keys.iter().any(|k| k.ends_with("/image_thumbnail.webp")));
}
