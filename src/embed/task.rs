use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::embed::encoder::Embedder;
use crate::foundation::error::{PanoError, PanoResult};
use crate::jobs::pool::{TaskHandle, TaskKind, TaskPool};
use crate::jobs::scratch::{ScratchDir, task_scratch_path};
use crate::storage::store::{ObjectStore, object_key, upload_or_existing};

/// Scratch directory suffix of embedding tasks.
pub const EMBEDDING_SUFFIX: &str = "embedding";
/// Uploaded embedding record name.
pub const EMBEDDING_FILE: &str = "embedding.json";

/// Embedding extraction for one published image.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingJob {
    /// Record the embedding belongs to.
    pub content_hash: String,
    /// Image to embed; only ever read.
    pub source_image_path: PathBuf,
    /// Caption embedded alongside the image.
    pub text: String,
    /// Directory owned by the task while it runs.
    pub scratch_dir: PathBuf,
}

impl EmbeddingJob {
    /// Job for `content_hash` with its scratch dir under `scratch_root`.
    pub fn new(
        content_hash: impl Into<String>,
        source_image_path: impl Into<PathBuf>,
        text: impl Into<String>,
        scratch_root: &Path,
    ) -> PanoResult<Self> {
        let content_hash = content_hash.into();
        let scratch_dir = task_scratch_path(scratch_root, &content_hash, EMBEDDING_SUFFIX)?;
        Ok(Self {
            content_hash,
            source_image_path: source_image_path.into(),
            text: text.into(),
            scratch_dir,
        })
    }
}

/// Stored form of an embedding.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingRecord {
    /// Content hash of the embedded image.
    pub id: String,
    /// Embedded caption.
    pub text: String,
    /// Vector length.
    pub dims: usize,
    /// Unit-length vector.
    pub vector: Vec<f32>,
}

/// Compute the embedding and upload it as `{hash}/embedding.json`.
///
/// Returns the record URL, `None` when the upload failed.
pub async fn run_embedding(
    job: EmbeddingJob,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ObjectStore>,
    cancel: CancellationToken,
) -> PanoResult<Option<String>> {
    let hash = job.content_hash.clone();
    let scratch = ScratchDir::create(&job.scratch_dir)?;
    let record_path = scratch.path().join(EMBEDDING_FILE);

    let path = record_path.clone();
    let dims = tokio::task::spawn_blocking(move || -> PanoResult<usize> {
        if cancel.is_cancelled() {
            return Err(PanoError::cancelled("embedding cancelled"));
        }
        let image = load_rgb(&job.source_image_path)?;
        let vector = embedder.encode(&image, &job.text)?;
        let record = EmbeddingRecord {
            id: job.content_hash,
            text: job.text,
            dims: vector.len(),
            vector,
        };
        let json = serde_json::to_vec(&record)
            .map_err(|e| PanoError::embed(format!("serialise record: {e}")))?;
        std::fs::write(&path, json)
            .map_err(|e| PanoError::embed(format!("write '{}': {e}", path.display())))?;
        Ok(record.dims)
    })
    .await
    .map_err(|e| PanoError::Other(anyhow::anyhow!("embedding worker panicked: {e}")))??;

    let url = upload_or_existing(store.as_ref(), &object_key(&hash, EMBEDDING_FILE), &record_path).await;
    tracing::info!(content_hash = %hash, dims, uploaded = url.is_some(), "embedding stored");
    drop(scratch);
    Ok(url)
}

fn load_rgb(path: &Path) -> PanoResult<image::RgbImage> {
    if !path.is_file() {
        return Err(PanoError::input(format!(
            "image '{}' does not exist",
            path.display()
        )));
    }
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| PanoError::embed(format!("decode '{}': {e}", path.display())))
}

/// Start `job` on `pool` without waiting for it.
pub fn launch_embedding(
    pool: &TaskPool,
    job: EmbeddingJob,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ObjectStore>,
) -> TaskHandle {
    let hash = job.content_hash.clone();
    pool.spawn(TaskKind::Embedding, hash, move |cancel| async move {
        let url = run_embedding(job, embedder, store, cancel).await?;
        Ok(format!("embedding={}", url.as_deref().unwrap_or("-")))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/embed/task.rs"]
mod tests;
