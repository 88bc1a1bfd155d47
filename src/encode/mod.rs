//! Encoding: frame sequences -> video + animated image.
//!
//! The pipeline talks to the external transcoder only through [`transcode::Transcoder`].

/// `ffmpeg`-backed transcoder.
pub mod ffmpeg;
/// Video -> palette -> animated image packaging.
pub mod package;
/// In-process transcoder for tests and dry runs.
pub mod scripted;
/// Transcoder contract and structured stage parameters.
pub mod transcode;
