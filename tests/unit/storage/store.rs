use super::*;
use crate::storage::memory::InMemoryStore;

fn artifact(dir: &Path, name: &str, body: &[u8]) -> std::path::PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

#[test]
fn content_types_follow_extension() {
    assert_eq!(content_type_for("h/animation.mp4"), "video/mp4");
    assert_eq!(content_type_for("h/animation.gif"), "image/gif");
    assert_eq!(content_type_for("h/image_thumbnail.webp"), "image/webp");
    assert_eq!(content_type_for("h/depth.PNG"), "image/png");
    assert_eq!(content_type_for("h/metadata.json"), "application/json");
    assert_eq!(content_type_for("h/blob"), "application/octet-stream");
}

#[test]
fn keys_are_hash_scoped() {
    assert_eq!(object_key("abc", "animation.mp4"), "abc/animation.mp4");
}

#[test]
fn escaping_keys_are_rejected() {
    for bad in ["", "/abs", "a/../b", "a//b", "./a", "a\\b"] {
        assert!(
            matches!(validate_key(bad), Err(StorageError::InvalidKey(_))),
            "{bad:?} should be rejected"
        );
    }
    assert!(validate_key("abc/animation.gif").is_ok());
}

#[tokio::test]
async fn duplicate_upload_reuses_existing_url() {
    let dir = tempfile::tempdir().unwrap();
    let file = artifact(dir.path(), "a.mp4", b"one");
    let store = InMemoryStore::new("http://cdn.test/bucket");

    let first = upload_or_existing(&store, "h/animation.mp4", &file).await;
    let second = upload_or_existing(&store, "h/animation.mp4", &file).await;

    assert_eq!(first.as_deref(), Some("http://cdn.test/bucket/h/animation.mp4"));
    assert_eq!(first, second);
    assert_eq!(
        store.get("h/animation.mp4").unwrap().content_type,
        "video/mp4"
    );
}

#[tokio::test]
async fn failed_upload_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let file = artifact(dir.path(), "a.gif", b"gif");
    let store = InMemoryStore::default().failing("h/animation.gif");

    assert!(upload_or_existing(&store, "h/animation.gif", &file).await.is_none());
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn missing_local_file_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::default();
    let missing = dir.path().join("nope.mp4");
    assert!(upload_or_existing(&store, "h/animation.mp4", &missing).await.is_none());
}
