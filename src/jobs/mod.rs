//! Background execution: bounded task pool, scratch directories, the animation job.

/// Animation job orchestration.
pub mod animation;
/// Bounded task pool with deadlines and supervision.
pub mod pool;
/// Self-removing scratch directories.
pub mod scratch;
