// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)]
// Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::let_unit_value)] // Avoids binding `()` to variables
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![warn(clippy::unwrap_used)] // Avoids using `unwrap()`
#![cfg_attr(test, allow(clippy::unwrap_used))]

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![warn(missing_docs)]

//! # AudioStreamAdapter
//!
//! Backpressure-aware bridge from blocking byte sources (audio files, pipes,
//! microphone lines) to demand-driven streaming consumers such as streaming
//! speech-to-text calls.
//!
//! ## Overview
//!
//! Streaming APIs pull audio at their own pace, while files and capture
//! devices are read with blocking calls. The [`streaming`] module sits in
//! between: a [`ChunkPublisher`](streaming::ChunkPublisher) reads fixed-size
//! chunks on a dedicated worker and pushes them to a subscriber only as fast
//! as the subscriber asks for them.
//!
//! ## Features
//!
//! - `cli` (default): the `stream-audio` command line tool
//! - `microphone`: capture from the default input device (using `cpal`)
//!
//! ## Error Handling
//!
//! ```rust
//! use audio_stream_adapter::streaming::{StreamError, StreamResult};
//!
//! let result: StreamResult<()> = Err(StreamError::demand_violation(0));
//!
//! match result {
//!     Ok(()) => {}
//!     Err(StreamError::DemandViolation { requested }) => {
//!         eprintln!("demand must be positive, got {requested}")
//!     }
//!     Err(other) => eprintln!("stream failed: {other}"),
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use audio_stream_adapter::streaming::*;
//! use std::io::Cursor;
//! use std::sync::mpsc;
//!
//! struct Collect(mpsc::Sender<Option<usize>>);
//!
//! impl ChunkSubscriber for Collect {
//!     fn on_chunk(&mut self, chunk: Chunk) {
//!         let _ = self.0.send(Some(chunk.len()));
//!     }
//!     fn on_complete(&mut self) {
//!         let _ = self.0.send(None);
//!     }
//!     fn on_error(&mut self, _error: StreamError) {
//!         let _ = self.0.send(None);
//!     }
//! }
//!
//! let (tx, rx) = mpsc::channel();
//! let mut publisher =
//!     ChunkPublisher::from_reader(Cursor::new(vec![0u8; 2548]), AdapterConfig::default())?;
//! let worker = publisher.subscribe(Collect(tx))?;
//! worker.request(5)?;
//!
//! let sizes: Vec<usize> = rx.iter().map_while(|len| len).collect();
//! assert_eq!(sizes, vec![1024, 1024, 500]);
//! worker.join()?;
//! # Ok::<(), StreamError>(())
//! ```
//!
//! ## License
//!
//! MIT License

pub mod intercept;
pub mod progress;
pub mod streaming;

pub use crate::intercept::{
    FaultConfig, FaultInjector, InterceptedSource, ReadCall, ReadInterceptor, ReadLogger,
};
pub use crate::progress::{
    CallbackProgressReporter, NullProgressReporter, ProgressInfo, ProgressReporter,
    ProgressTracker,
};
#[cfg(feature = "cli")]
pub use crate::progress::ProgressBarReporter;
pub use crate::streaming::{
    AdapterConfig, Chunk, ChunkPublisher, ChunkSource, ChunkStream, ChunkSubscriber, ReadOutcome,
    StreamError, StreamResult, StreamState, Subscription,
};
