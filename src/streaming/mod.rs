//! Demand-driven streaming of byte chunks from blocking sources.
//!
//! A [`ChunkPublisher`] owns a blocking source (file, pipe, microphone line,
//! tone generator) and pushes its bytes, chunk by chunk, to a single
//! [`ChunkSubscriber`]. The subscriber controls the pace: nothing is read
//! until it asks for chunks through its [`Subscription`], and never more
//! chunks are delivered than it asked for.
//!
//! # Features
//!
//! - **Backpressure**: delivery is bounded by outstanding demand
//! - **Single reader**: one worker thread per subscription reads the source
//! - **Exactly-once termination**: one `on_complete` or `on_error`, always last
//! - **Cancellation**: from any thread, at any time, silently
//!
//! # Example
//!
//! ```rust,no_run
//! use audio_stream_adapter::streaming::*;
//! use futures::StreamExt;
//!
//! async fn upload(path: &str) -> Result<(), StreamError> {
//!     let publisher = ChunkPublisher::open(path, AdapterConfig::default())?;
//!     let mut chunks = publisher.into_stream()?;
//!
//!     while let Some(chunk) = chunks.next().await {
//!         let chunk = chunk?;
//!         // Hand the bytes to the streaming call
//!         let _ = chunk.len();
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod chunk;
pub mod demand;
pub mod error;
pub mod sources;
pub mod stream;
pub mod traits;

#[cfg(test)]
mod tests;

// Re-export main types for convenience
pub use channel::ChunkStream;
pub use chunk::{Chunk, DEFAULT_CHUNK_SIZE, ReadOutcome};
pub use demand::Demand;
pub use error::{StreamError, StreamErrorMetrics, StreamResult};
pub use sources::{FileSource, ReaderSource, ToneConfig, ToneSource};
pub use stream::{ChunkPublisher, StreamState, StreamWorker, Subscription};
pub use traits::{AdapterConfig, ChunkSource, ChunkSubscriber, StreamMetrics};

#[cfg(feature = "microphone")]
pub use sources::{CaptureFormat, MicrophoneSource};
