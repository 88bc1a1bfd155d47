//! Sibling embedding task.

/// `Embedder` contract and the local histogram embedder.
pub mod encoder;
/// Background embedding extraction and upload.
pub mod task;
