use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::error::{PanoError, PanoResult};

/// Exclusively owned temporary directory, removed recursively when dropped.
///
/// Removal runs on every exit path (errors, panics, deadline cancellation). A failed removal is
/// logged as a cleanup error and otherwise ignored.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `path` fresh, deleting whatever a previous run left there.
    pub fn create(path: impl Into<PathBuf>) -> PanoResult<Self> {
        let path = path.into();
        match std::fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!(dir = %path.display(), "removed stale scratch dir"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PanoError::cleanup(format!(
                    "remove stale scratch dir '{}': {e}",
                    path.display()
                )));
            }
        }
        std::fs::create_dir_all(&path).map_err(|e| {
            PanoError::render(format!("create scratch dir '{}': {e}", path.display()))
        })?;
        Ok(Self { path })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(dir = %self.path.display(), "scratch dir removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let err = PanoError::cleanup(format!("remove '{}': {e}", self.path.display()));
                tracing::warn!(error = %err, "scratch dir left behind");
            }
        }
    }
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// Scratch location of one task instance: `{content_hash}-{suffix}-{pid}-{n}`.
///
/// Every call returns a new name, so repeated jobs for the same record never share a directory.
pub fn task_scratch_path(root: &Path, content_hash: &str, suffix: &str) -> PanoResult<PathBuf> {
    validate_content_hash(content_hash)?;
    let n = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
    Ok(root.join(format!(
        "{content_hash}-{suffix}-{}-{n}",
        std::process::id()
    )))
}

/// Content hashes name directories and key prefixes, so they must be plain tokens.
pub fn validate_content_hash(content_hash: &str) -> PanoResult<()> {
    let ok = !content_hash.is_empty()
        && content_hash
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !ok {
        return Err(PanoError::input(format!(
            "content hash '{content_hash}' must be a non-empty [A-Za-z0-9_-] token"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/scratch.rs"]
mod tests;
