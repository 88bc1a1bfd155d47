//! Panorama projection and frame-sequence generation.

/// Equirectangular -> perspective sampler.
pub mod sampler;
/// Yaw sweeps written to numbered frame files.
pub mod sequence;
/// Source panorama raster.
pub mod sphere;
