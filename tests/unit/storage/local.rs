use super::*;

async fn source(dir: &Path, body: &[u8]) -> PathBuf {
    let p = dir.join("src.bin");
    tokio::fs::write(&p, body).await.unwrap();
    p
}

#[tokio::test]
async fn put_copies_under_key_and_returns_url() {
    let src_dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let file = source(src_dir.path(), b"video").await;
    let store = LocalObjectStore::new(root.path(), "http://localhost:9000/pano/");

    let url = store
        .put_file("abc/animation.mp4", &file, "video/mp4")
        .await
        .unwrap();

    assert_eq!(url, "http://localhost:9000/pano/abc/animation.mp4");
    assert_eq!(
        std::fs::read(root.path().join("abc/animation.mp4")).unwrap(),
        b"video"
    );
}

#[tokio::test]
async fn existing_object_is_not_replaced() {
    let src_dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let first = source(src_dir.path(), b"first").await;
    let store = LocalObjectStore::new(root.path(), "http://x");
    store.put_file("k/a.gif", &first, "image/gif").await.unwrap();

    let second = src_dir.path().join("second.bin");
    std::fs::write(&second, b"second").unwrap();
    let err = store
        .put_file("k/a.gif", &second, "image/gif")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::AlreadyExists(ref k) if k == "k/a.gif"));
    assert_eq!(std::fs::read(store.path_for("k/a.gif")).unwrap(), b"first");
}

#[tokio::test]
async fn overwrite_mode_replaces() {
    let src_dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::new(root.path(), "http://x").with_overwrite(true);

    let a = source(src_dir.path(), b"a").await;
    store.put_file("k/a.json", &a, "application/json").await.unwrap();
    let b = src_dir.path().join("b.bin");
    std::fs::write(&b, b"b").unwrap();
    store.put_file("k/a.json", &b, "application/json").await.unwrap();

    assert_eq!(std::fs::read(store.path_for("k/a.json")).unwrap(), b"b");
}

#[tokio::test]
async fn traversal_keys_never_touch_disk() {
    let src_dir = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let file = source(src_dir.path(), b"x").await;
    let store = LocalObjectStore::new(root.path().join("store"), "http://x");

    let err = store
        .put_file("../escape.bin", &file, "application/octet-stream")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));
    assert!(!root.path().join("escape.bin").exists());
    assert!(!store.root().exists());
}
