//! Error types for streaming operations.

use std::io;

/// Streaming-specific error types.
///
/// End of source is deliberately absent: it is a normal outcome reported via
/// [`ReadOutcome::EndOfSource`](super::chunk::ReadOutcome::EndOfSource).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// I/O failure while reading the byte source
    #[error("Read error: {0}")]
    Read(#[from] io::Error),

    /// A demand increase that was not a positive integer
    #[error("Demand violation: requested {requested} chunks, demand must be positive")]
    DemandViolation {
        /// The rejected amount
        requested: i64,
    },

    /// Stream configuration errors
    #[error("Invalid stream configuration: {0}")]
    InvalidConfig(String),

    /// A publisher owns its source and can only be subscribed once
    #[error("Publisher already has a subscriber")]
    AlreadySubscribed,

    /// Failure produced by a read interceptor
    #[error("Injected fault on read call {call}")]
    Injected {
        /// One-based index of the failed read call
        call: u64,
    },

    /// The worker thread could not be started
    #[error("Failed to spawn stream worker: {0}")]
    WorkerSpawn(String),

    /// The worker thread panicked
    #[error("Stream worker panicked")]
    WorkerPanicked,

    /// Capture device errors
    #[error("Device error: {0}")]
    Device(String),

    /// Consumer-side failures
    #[error("Sink error: {0}")]
    Sink(String),
}

impl StreamError {
    /// Create an invalid configuration error
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig(details.into())
    }

    /// Create a demand violation error
    pub const fn demand_violation(requested: i64) -> Self {
        Self::DemandViolation { requested }
    }

    /// Create an injected fault error
    pub const fn injected(call: u64) -> Self {
        Self::Injected { call }
    }

    /// Create a device error
    pub fn device(details: impl Into<String>) -> Self {
        Self::Device(details.into())
    }

    /// Create a sink error
    pub fn sink(details: impl Into<String>) -> Self {
        Self::Sink(details.into())
    }

    /// Check if this error ends a stream when it reaches the worker.
    ///
    /// Caller mistakes (bad demand, bad config, double subscribe) are rejected
    /// at the call site and leave any running stream untouched.
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::Read(_) | Self::Injected { .. } | Self::Device(_) | Self::Sink(_) => true,
            Self::DemandViolation { .. }
            | Self::InvalidConfig(_)
            | Self::AlreadySubscribed
            | Self::WorkerSpawn(_)
            | Self::WorkerPanicked => false,
        }
    }

    /// Check if this error was caused by the caller rather than the source
    pub const fn is_caller_error(&self) -> bool {
        !self.is_terminal()
    }
}

impl Clone for StreamError {
    fn clone(&self) -> Self {
        match self {
            Self::Read(err) => Self::Read(io::Error::new(err.kind(), err.to_string())),
            Self::DemandViolation { requested } => Self::DemandViolation {
                requested: *requested,
            },
            Self::InvalidConfig(msg) => Self::InvalidConfig(msg.clone()),
            Self::AlreadySubscribed => Self::AlreadySubscribed,
            Self::Injected { call } => Self::Injected { call: *call },
            Self::WorkerSpawn(msg) => Self::WorkerSpawn(msg.clone()),
            Self::WorkerPanicked => Self::WorkerPanicked,
            Self::Device(msg) => Self::Device(msg.clone()),
            Self::Sink(msg) => Self::Sink(msg.clone()),
        }
    }
}

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Metrics for stream error tracking
#[derive(Debug, Clone, Default)]
pub struct StreamErrorMetrics {
    /// Every recorded error
    pub total_errors: u64,
    /// Source I/O failures
    pub read_errors: u64,
    /// Failures produced by an interceptor
    pub injected_errors: u64,
    /// Rejected demand increases
    pub demand_violations: u64,
    /// Errors that ended a stream
    pub terminal_errors: u64,
}

impl StreamErrorMetrics {
    /// Record a new error
    pub fn record_error(&mut self, error: &StreamError) {
        self.total_errors += 1;

        match error {
            StreamError::Read(_) => self.read_errors += 1,
            StreamError::Injected { .. } => self.injected_errors += 1,
            StreamError::DemandViolation { .. } => self.demand_violations += 1,
            _ => {}
        }

        if error.is_terminal() {
            self.terminal_errors += 1;
        }
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
