//! Chunk source implementations.

pub mod file;
pub mod generator;
#[cfg(feature = "microphone")]
pub mod microphone;

// Re-export main source types
pub use file::ReaderSource;
pub use generator::{ToneConfig, ToneSource};
#[cfg(feature = "microphone")]
pub use microphone::{CaptureFormat, MicrophoneSource};

/// A chunk source over an open file.
pub type FileSource = ReaderSource<std::fs::File>;
