//! Core traits for demand-driven chunk streaming.

use super::chunk::{Chunk, DEFAULT_CHUNK_SIZE, ReadOutcome};
use super::error::{StreamError, StreamResult};
use super::stream::Subscription;
use serde::{Deserialize, Serialize};

/// A blocking, pull-based byte source.
///
/// Sources are read by exactly one worker thread at a time. A call may block
/// until at least one byte is available or the source is known to be closed.
pub trait ChunkSource: Send {
    /// Read the next chunk.
    ///
    /// Returns [`ReadOutcome::EndOfSource`] when the source is exhausted.
    /// I/O failures are returned as errors and are never folded into
    /// end of source.
    fn read_chunk(&mut self) -> StreamResult<ReadOutcome>;

    /// Maximum number of bytes a single chunk may hold.
    fn chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }

    /// Total number of bytes this source will produce, if known.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn read_chunk(&mut self) -> StreamResult<ReadOutcome> {
        (**self).read_chunk()
    }

    fn chunk_size(&self) -> usize {
        (**self).chunk_size()
    }

    fn size_hint(&self) -> Option<u64> {
        (**self).size_hint()
    }
}

/// Receives chunks pushed by a publisher.
///
/// All callbacks for one subscription run on the same worker thread, one at a
/// time. After [`on_complete`](Self::on_complete) or
/// [`on_error`](Self::on_error) no further callback is made. Implementations
/// may call [`Subscription::request`] and [`Subscription::cancel`] from inside
/// any callback.
pub trait ChunkSubscriber: Send {
    /// Called once on the worker thread before any other callback.
    fn on_subscribe(&mut self, subscription: &Subscription) {
        let _ = subscription;
    }

    /// A chunk that was requested.
    fn on_chunk(&mut self, chunk: Chunk);

    /// The source is exhausted. Terminal.
    fn on_complete(&mut self);

    /// Reading the source failed. Terminal.
    fn on_error(&mut self, error: StreamError);
}

/// Configuration for a publisher and its worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Maximum chunk size in bytes
    pub chunk_size: usize,

    /// Name given to the worker thread
    pub worker_name: String,

    /// Demand kept outstanding by channel-backed consumers
    pub prefetch: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_name: "chunk-stream".to_string(),
            prefetch: 4,
        }
    }
}

impl AdapterConfig {
    /// Create configuration for small chunks and shallow prefetch
    pub fn low_latency() -> Self {
        Self {
            chunk_size: 256,
            prefetch: 2,
            ..Default::default()
        }
    }

    /// Create configuration for bulk transfer of large files
    pub fn high_throughput() -> Self {
        Self {
            chunk_size: 8192,
            prefetch: 16,
            ..Default::default()
        }
    }

    /// Check the configuration for values the adapter cannot work with.
    pub fn validate(&self) -> StreamResult<()> {
        if self.chunk_size == 0 {
            return Err(StreamError::invalid_config("chunk_size must be > 0"));
        }
        if self.prefetch == 0 {
            return Err(StreamError::invalid_config("prefetch must be > 0"));
        }
        if self.prefetch > i64::MAX as usize {
            return Err(StreamError::invalid_config(format!(
                "prefetch {} exceeds the maximum demand",
                self.prefetch
            )));
        }
        if self.worker_name.contains('\0') {
            return Err(StreamError::invalid_config(
                "worker_name must not contain NUL bytes",
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of a subscription's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamMetrics {
    /// Calls to `request`, rejected ones included
    pub requests: u64,
    /// Requests refused for a non-positive amount
    pub rejected_requests: u64,
    /// Chunks handed to the subscriber
    pub chunks_delivered: u64,
    /// Bytes handed to the subscriber
    pub bytes_delivered: u64,
    /// Demand not yet consumed by deliveries
    pub outstanding_demand: u64,
}

impl StreamMetrics {
    /// Mean size of delivered chunks in bytes.
    pub fn average_chunk_size(&self) -> f64 {
        if self.chunks_delivered == 0 {
            0.0
        } else {
            self.bytes_delivered as f64 / self.chunks_delivered as f64
        }
    }
}
