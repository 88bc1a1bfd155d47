use crate::encode::transcode::EncodeError;
use crate::storage::store::StorageError;

/// Convenience result type used across panoreel.
pub type PanoResult<T> = Result<T, PanoError>;

/// Top-level error taxonomy used by the rendering, encoding and publishing APIs.
#[derive(thiserror::Error, Debug)]
pub enum PanoError {
    /// Invalid caller-provided parameters. Reported before any work is done.
    #[error("input error: {0}")]
    Input(String),

    /// The source panorama could not be read or decoded, or a frame could not be written.
    #[error("render error: {0}")]
    Render(String),

    /// An external transcoder stage failed.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The storage collaborator rejected an upload.
    #[error("upload error: {0}")]
    Upload(#[from] StorageError),

    /// A scratch directory could not be removed.
    #[error("cleanup error: {0}")]
    Cleanup(String),

    /// The embedding collaborator failed.
    #[error("embedding error: {0}")]
    Embed(String),

    /// Work stopped because its deadline expired or it was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PanoError {
    /// Build a [`PanoError::Input`] value.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Build a [`PanoError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`PanoError::Cleanup`] value.
    pub fn cleanup(msg: impl Into<String>) -> Self {
        Self::Cleanup(msg.into())
    }

    /// Build a [`PanoError::Embed`] value.
    pub fn embed(msg: impl Into<String>) -> Self {
        Self::Embed(msg.into())
    }

    /// Build a [`PanoError::Cancelled`] value.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Return `true` for errors raised before any work was started.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
