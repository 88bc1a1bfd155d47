//! Publishing a generated panorama: the event that starts the background tasks.

/// Publish flow.
pub mod flow;
/// Content hashing.
pub mod hash;
/// Thumbnails.
pub mod thumbnail;
