use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::embed::encoder::Embedder;
use crate::embed::task::{EmbeddingJob, launch_embedding};
use crate::encode::transcode::Transcoder;
use crate::foundation::core::AnimationSettings;
use crate::foundation::error::{PanoError, PanoResult};
use crate::jobs::animation::{AnimationJob, launch_animation};
use crate::jobs::pool::TaskPool;
use crate::jobs::scratch::{ScratchDir, task_scratch_path};
use crate::publish::hash::hash_file;
use crate::publish::thumbnail::write_thumbnail;
use crate::storage::store::{ObjectStore, object_key, upload_or_existing};

const PUBLISH_SUFFIX: &str = "publish";
const IMAGE_EXTENSIONS: &[&str] = &["webp", "png", "jpg", "jpeg"];

/// A generated panorama to publish.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PublishRequest {
    /// Equirectangular image.
    pub image_path: PathBuf,
    /// Companion depth image.
    pub depth_path: Option<PathBuf>,
    /// Prompt the image was generated from; also the embedding caption.
    pub prompt: String,
    /// Free-form generation parameters, copied into the metadata record.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Generation graph, stored as `workflow.json` when present.
    pub workflow: Option<serde_json::Value>,
}

/// Returned to the caller before the background tasks finish.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PublishResponse {
    /// Content hash of the image.
    pub id: String,
    /// Image URL, `None` if its upload failed.
    pub image_url: Option<String>,
    /// Depth image URL.
    pub depth_url: Option<String>,
    /// Metadata record URL.
    pub metadata_url: Option<String>,
}

/// Metadata record stored as `{hash}/metadata.json`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Metadata {
    /// Content hash.
    pub id: String,
    /// Generation prompt.
    pub prompt: String,
    /// Generation parameters, flattened into the record.
    #[serde(flatten)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Depth image URL.
    pub depth_url: Option<String>,
    /// Image thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Depth thumbnail URL.
    pub depth_thumbnail_url: Option<String>,
    /// Workflow URL.
    pub workflow_url: Option<String>,
}

/// Collaborators used by [`publish`].
#[derive(Clone)]
pub struct PublishServices {
    /// Artifact storage.
    pub store: Arc<dyn ObjectStore>,
    /// Encoder used by animation jobs.
    pub transcoder: Arc<dyn Transcoder>,
    /// Embedding model.
    pub embedder: Arc<dyn Embedder>,
    /// Background pool.
    pub pool: TaskPool,
    /// Parent of every task's scratch directory.
    pub scratch_root: PathBuf,
    /// Animation parameters.
    pub animation: AnimationSettings,
}

/// Publish a generated panorama and start its background tasks.
///
/// Uploads the image, depth image, thumbnails, workflow and metadata under the image's content
/// hash, then launches the animation job (supervised) and the embedding task (detached) and
/// returns without waiting for either. Individual upload failures only blank their URL; invalid
/// requests fail before anything is uploaded.
#[tracing::instrument(skip_all, fields(image = %request.image_path.display()))]
pub async fn publish(
    request: &PublishRequest,
    services: &PublishServices,
) -> PanoResult<PublishResponse> {
    let image_ext = image_extension(&request.image_path)?;
    let depth_ext = request
        .depth_path
        .as_deref()
        .map(image_extension)
        .transpose()?;

    let image_path = request.image_path.clone();
    let id = tokio::task::spawn_blocking(move || hash_file(&image_path))
        .await
        .map_err(|e| PanoError::Other(anyhow::anyhow!("hash worker panicked: {e}")))??;
    tracing::info!(content_hash = %id, "publishing");

    let animation_job = AnimationJob::new(
        &id,
        &request.image_path,
        &services.scratch_root,
        services.animation.clone(),
    )?;
    let embedding_job = EmbeddingJob::new(
        &id,
        &request.image_path,
        &request.prompt,
        &services.scratch_root,
    )?;

    let scratch = ScratchDir::create(task_scratch_path(
        &services.scratch_root,
        &id,
        PUBLISH_SUFFIX,
    )?)?;
    let store = services.store.as_ref();

    let image_url = upload_or_existing(
        store,
        &object_key(&id, &format!("image.{image_ext}")),
        &request.image_path,
    )
    .await;
    let depth_url = match (&request.depth_path, &depth_ext) {
        (Some(path), Some(ext)) => {
            upload_or_existing(store, &object_key(&id, &format!("depth.{ext}")), path).await
        }
        _ => None,
    };

    let thumbnail_url =
        upload_thumbnail(store, &id, &request.image_path, scratch.path(), "image_thumbnail.webp")
            .await;
    let depth_thumbnail_url = match &request.depth_path {
        Some(path) => {
            upload_thumbnail(store, &id, path, scratch.path(), "depth_thumbnail.webp").await
        }
        None => None,
    };

    let workflow_url = match &request.workflow {
        Some(workflow) => {
            upload_json(store, &id, scratch.path(), "workflow.json", workflow).await
        }
        None => None,
    };

    let metadata = Metadata {
        id: id.clone(),
        prompt: request.prompt.clone(),
        parameters: request.parameters.clone(),
        image_url: image_url.clone(),
        depth_url: depth_url.clone(),
        thumbnail_url,
        depth_thumbnail_url,
        workflow_url,
    };
    let metadata_url = upload_json(store, &id, scratch.path(), "metadata.json", &metadata).await;
    drop(scratch);

    let animation = launch_animation(
        &services.pool,
        animation_job,
        Arc::clone(&services.transcoder),
        Arc::clone(&services.store),
    );
    services.pool.supervise(animation);
    // Detached: reports on the pool channel, joined only by shutdown.
    let _embedding = launch_embedding(
        &services.pool,
        embedding_job,
        Arc::clone(&services.embedder),
        Arc::clone(&services.store),
    );

    Ok(PublishResponse {
        id,
        image_url,
        depth_url,
        metadata_url,
    })
}

/// Lowercase extension of a publishable image.
fn image_extension(path: &Path) -> PanoResult<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(PanoError::input(format!(
            "'{}' is not one of {IMAGE_EXTENSIONS:?}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(PanoError::input(format!(
            "image '{}' does not exist",
            path.display()
        )));
    }
    Ok(ext)
}

async fn upload_thumbnail(
    store: &dyn ObjectStore,
    id: &str,
    src: &Path,
    scratch: &Path,
    name: &str,
) -> Option<String> {
    let dest = scratch.join(name);
    let (s, d) = (src.to_path_buf(), dest.clone());
    let written = tokio::task::spawn_blocking(move || write_thumbnail(&s, &d)).await;
    match written {
        Ok(Ok(_)) => upload_or_existing(store, &object_key(id, name), &dest).await,
        Ok(Err(e)) => {
            tracing::warn!(content_hash = id, name, error = %e, "thumbnail skipped");
            None
        }
        Err(e) => {
            tracing::warn!(content_hash = id, name, error = %e, "thumbnail worker panicked");
            None
        }
    }
}

async fn upload_json<T: serde::Serialize + ?Sized>(
    store: &dyn ObjectStore,
    id: &str,
    scratch: &Path,
    name: &str,
    value: &T,
) -> Option<String> {
    let path = scratch.join(name);
    let written = serde_json::to_vec_pretty(value)
        .map_err(|e| e.to_string())
        .map(|bytes| std::fs::write(&path, bytes).map_err(|e| e.to_string()));
    match written {
        Ok(Ok(())) => upload_or_existing(store, &object_key(id, name), &path).await,
        Ok(Err(e)) | Err(e) => {
            tracing::warn!(content_hash = id, name, error = %e, "record not written");
            None
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/publish/flow.rs"]
mod tests;
