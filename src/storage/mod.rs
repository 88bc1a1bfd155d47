//! Artifact storage seam.

/// Directory-tree backed store.
pub mod local;
/// In-memory store for tests and debugging.
pub mod memory;
/// `ObjectStore` contract, key helpers and upload policy.
pub mod store;
