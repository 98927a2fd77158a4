//! Demand-driven publisher, its subscription handle and the worker loop.

use super::{
    chunk::ReadOutcome,
    demand::Demand,
    error::{StreamError, StreamErrorMetrics, StreamResult},
    traits::{AdapterConfig, ChunkSource, ChunkSubscriber, StreamMetrics},
};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Lifecycle of a subscription.
///
/// Transitions only move forward: `Active -> Draining -> Completed`, or
/// `Active | Draining -> Failed`. Cancelling moves a live stream straight to
/// `Completed` without any terminal callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Chunks may be delivered
    Active,
    /// The source is exhausted and the completion signal has not been sent yet
    Draining,
    /// The stream finished or was cancelled
    Completed,
    /// Reading the source failed
    Failed(String),
}

impl StreamState {
    /// Check if chunks may still be delivered
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the stream has reached a final state
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// Check if the stream ended with an error
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Draining)
                | (Self::Active | Self::Draining, Self::Completed)
                | (Self::Active | Self::Draining, Self::Failed(_))
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    rejected_requests: AtomicU64,
    chunks_delivered: AtomicU64,
    bytes_delivered: AtomicU64,
}

#[derive(Debug)]
struct Shared {
    demand: Demand,
    cancelled: AtomicBool,
    state: Mutex<StreamState>,
    wake: Sender<()>,
    /// Caller-side handles; the subscriber's handles are not counted
    handles: AtomicUsize,
    counters: Counters,
    errors: Mutex<StreamErrorMetrics>,
}

impl Shared {
    /// Nudge the worker. A full channel already holds a pending wake-up.
    fn wake(&self) {
        if let Err(TrySendError::Disconnected(())) = self.wake.try_send(()) {
            tracing::trace!("wake-up after worker exit");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Move to `next` unless cancelled or the transition is not allowed.
    fn transition(&self, next: StreamState) -> bool {
        let mut state = self.state.lock();
        if self.is_cancelled() || !state.can_transition_to(&next) {
            return false;
        }
        *state = next;
        true
    }
}

/// Handle used by the consumer to signal demand or cancel.
///
/// Cheap to clone and safe to use from any thread. Dropping the last
/// caller-side handle cancels the stream. The handle passed to
/// [`ChunkSubscriber::on_subscribe`](super::traits::ChunkSubscriber::on_subscribe)
/// and its clones work the same way but do not keep the stream alive.
#[derive(Debug)]
pub struct Subscription {
    shared: Arc<Shared>,
    counted: bool,
}

impl Subscription {
    fn new(shared: Arc<Shared>) -> Self {
        shared.handles.fetch_add(1, Ordering::AcqRel);
        Self {
            shared,
            counted: true,
        }
    }

    /// Handle for the subscriber side, which is owned by the worker.
    fn subscriber_side(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            counted: false,
        }
    }

    /// Ask for up to `n` more chunks.
    ///
    /// Never blocks. `n` must be positive; anything else is rejected with
    /// [`StreamError::DemandViolation`] and the outstanding demand is left
    /// unchanged. Requests after the stream has ended are accepted and ignored.
    pub fn request(&self, n: i64) -> StreamResult<()> {
        self.shared.counters.requests.fetch_add(1, Ordering::Relaxed);

        if let Err(err) = self.shared.demand.increase(n) {
            self.shared
                .counters
                .rejected_requests
                .fetch_add(1, Ordering::Relaxed);
            self.shared.errors.lock().record_error(&err);
            tracing::warn!(requested = n, "rejected demand increase");
            return Err(err);
        }

        if !self.shared.is_cancelled() {
            self.shared.wake();
        }
        Ok(())
    }

    /// Stop all further delivery.
    ///
    /// Idempotent. A read already in progress finishes on the worker and its
    /// result is dropped; no terminal callback follows a cancel.
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let mut state = self.shared.state.lock();
            if !state.is_terminal() {
                *state = StreamState::Completed;
                tracing::debug!("stream cancelled");
            }
        }

        self.shared.wake();
    }

    /// Check if [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.shared.state.lock().clone()
    }

    /// Chunks requested but not yet delivered.
    pub fn outstanding_demand(&self) -> u64 {
        self.shared.demand.outstanding()
    }

    /// Snapshot of the subscription counters.
    pub fn metrics(&self) -> StreamMetrics {
        let counters = &self.shared.counters;
        StreamMetrics {
            requests: counters.requests.load(Ordering::Relaxed),
            rejected_requests: counters.rejected_requests.load(Ordering::Relaxed),
            chunks_delivered: counters.chunks_delivered.load(Ordering::Relaxed),
            bytes_delivered: counters.bytes_delivered.load(Ordering::Relaxed),
            outstanding_demand: self.shared.demand.outstanding(),
        }
    }

    /// Errors seen by this subscription: rejected requests and the failure
    /// that ended the stream, if any.
    pub fn error_metrics(&self) -> StreamErrorMetrics {
        self.shared.errors.lock().clone()
    }
}

impl Clone for Subscription {
    fn clone(&self) -> Self {
        let shared = Arc::clone(&self.shared);
        if self.counted {
            Self::new(shared)
        } else {
            Self::subscriber_side(shared)
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.counted && self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.cancel();
        }
    }
}

/// Owns a source and pushes its chunks to a single subscriber on demand.
pub struct ChunkPublisher<S: ChunkSource> {
    source: Option<S>,
    config: AdapterConfig,
}

impl<S: ChunkSource + 'static> ChunkPublisher<S> {
    /// Create a publisher with the default configuration.
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            config: AdapterConfig::default(),
        }
    }

    /// Create a publisher with a custom configuration.
    pub fn with_config(source: S, config: AdapterConfig) -> StreamResult<Self> {
        config.validate()?;
        Ok(Self {
            source: Some(source),
            config,
        })
    }

    /// The publisher configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Check if a subscriber has already taken the source.
    pub fn is_subscribed(&self) -> bool {
        self.source.is_none()
    }

    /// Start the worker and attach `subscriber`.
    ///
    /// Nothing is read until the subscriber's demand becomes positive.
    /// A publisher can be subscribed once; later calls fail with
    /// [`StreamError::AlreadySubscribed`].
    pub fn subscribe<B>(&mut self, subscriber: B) -> StreamResult<StreamWorker<S>>
    where
        B: ChunkSubscriber + 'static,
    {
        let source = self.source.take().ok_or(StreamError::AlreadySubscribed)?;

        let (wake_tx, wake_rx) = channel::bounded(1);
        let shared = Arc::new(Shared {
            demand: Demand::new(),
            cancelled: AtomicBool::new(false),
            state: Mutex::new(StreamState::Active),
            wake: wake_tx,
            handles: AtomicUsize::new(0),
            counters: Counters::default(),
            errors: Mutex::new(StreamErrorMetrics::default()),
        });
        let subscription = Subscription::new(Arc::clone(&shared));

        let worker_name = self.config.worker_name.clone();
        let handle = thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || run_worker(source, subscriber, shared, wake_rx, worker_name))
            .map_err(|err| StreamError::WorkerSpawn(err.to_string()))?;

        Ok(StreamWorker {
            subscription,
            handle,
        })
    }
}

/// A running subscription together with its worker thread.
#[derive(Debug)]
pub struct StreamWorker<S> {
    subscription: Subscription,
    handle: JoinHandle<S>,
}

impl<S> StreamWorker<S> {
    /// The subscription controlling this worker.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Shorthand for [`Subscription::request`].
    pub fn request(&self, n: i64) -> StreamResult<()> {
        self.subscription.request(n)
    }

    /// Shorthand for [`Subscription::cancel`].
    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    /// Check if the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to exit and take the source back.
    ///
    /// The worker exits after a terminal signal or a cancel; joining a stream
    /// that is still waiting for demand blocks until one of those happens.
    pub fn join(self) -> StreamResult<S> {
        let Self {
            subscription,
            handle,
        } = self;
        let joined = handle.join();
        drop(subscription);
        joined.map_err(|_| StreamError::WorkerPanicked)
    }
}

fn run_worker<S, B>(
    mut source: S,
    mut subscriber: B,
    shared: Arc<Shared>,
    wake: Receiver<()>,
    name: String,
) -> S
where
    S: ChunkSource,
    B: ChunkSubscriber,
{
    tracing::debug!(worker = %name, chunk_size = source.chunk_size(), "stream worker started");

    {
        let subscription = Subscription::subscriber_side(Arc::clone(&shared));
        if !shared.is_cancelled() {
            subscriber.on_subscribe(&subscription);
        }
    }

    loop {
        if shared.is_cancelled() {
            break;
        }

        if !shared.demand.has_demand() {
            if wake.recv().is_err() {
                break;
            }
            continue;
        }

        let outcome = source.read_chunk();

        if shared.is_cancelled() {
            break;
        }

        match outcome {
            Ok(ReadOutcome::Chunk(chunk)) => {
                let taken = shared.demand.try_take_one();
                debug_assert!(taken, "only the worker consumes demand");

                let len = chunk.len() as u64;
                shared
                    .counters
                    .chunks_delivered
                    .fetch_add(1, Ordering::Relaxed);
                shared
                    .counters
                    .bytes_delivered
                    .fetch_add(len, Ordering::Relaxed);
                tracing::trace!(worker = %name, len, "delivering chunk");

                subscriber.on_chunk(chunk);
            }
            Ok(ReadOutcome::EndOfSource) => {
                if shared.transition(StreamState::Draining) {
                    tracing::info!(
                        worker = %name,
                        chunks = shared.counters.chunks_delivered.load(Ordering::Relaxed),
                        bytes = shared.counters.bytes_delivered.load(Ordering::Relaxed),
                        "source exhausted, completing stream"
                    );
                    subscriber.on_complete();
                    shared.transition(StreamState::Completed);
                }
                break;
            }
            Err(err) => {
                if shared.transition(StreamState::Failed(err.to_string())) {
                    shared.errors.lock().record_error(&err);
                    tracing::warn!(worker = %name, error = %err, "stream failed");
                    subscriber.on_error(err);
                }
                break;
            }
        }
    }

    tracing::debug!(worker = %name, cancelled = shared.is_cancelled(), "stream worker exiting");
    source
}
