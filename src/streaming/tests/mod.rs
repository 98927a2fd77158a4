//! Tests for streaming functionality.
//!
//! Scripted sources and recording subscribers make the threaded adapter
//! deterministic enough to assert exact callback sequences.

use super::chunk::{Chunk, ReadOutcome};
use super::error::{StreamError, StreamResult};
use super::stream::Subscription;
use super::traits::{ChunkSource, ChunkSubscriber};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

mod config_tests;
mod error_tests;

/// Long enough for any worker hand-off on a loaded CI machine.
pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to watch for callbacks that must not happen.
pub(crate) const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// One step of a scripted source.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Bytes(Vec<u8>),
    Fail(io::ErrorKind),
}

/// A source that replays a fixed script, then reports end of source.
///
/// With a gate attached, every read waits for a token on the gate so tests
/// can hold the worker inside a read. The read counter is bumped on entry.
pub(crate) struct ScriptedSource {
    steps: VecDeque<Step>,
    reads: Arc<AtomicUsize>,
    gate: Option<Receiver<()>>,
}

impl ScriptedSource {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            reads: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    /// Chunks whose first byte is their index, with the given sizes.
    pub(crate) fn labelled(sizes: &[usize]) -> Self {
        Self::new(
            sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| Step::Bytes(vec![i as u8; size])),
        )
    }

    pub(crate) fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = channel::unbounded();
        self.gate = Some(rx);
        (self, tx)
    }

    pub(crate) fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl ChunkSource for ScriptedSource {
    fn read_chunk(&mut self) -> StreamResult<ReadOutcome> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv_timeout(EVENT_TIMEOUT);
        }

        match self.steps.pop_front() {
            Some(Step::Bytes(bytes)) => Ok(ReadOutcome::Chunk(Chunk::new(bytes))),
            Some(Step::Fail(kind)) => Err(StreamError::Read(io::Error::new(kind, "scripted"))),
            None => Ok(ReadOutcome::EndOfSource),
        }
    }
}

/// Callback observed by a [`Recorder`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Subscribed,
    Chunk(Vec<u8>),
    Complete,
    Error(String),
}

impl Event {
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error(_))
    }
}

/// What a [`Recorder`] does from inside its callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum Reaction {
    #[default]
    Nothing,
    /// Request `n` chunks from `on_subscribe`
    RequestOnSubscribe(i64),
    /// Request `n` from `on_subscribe`, then one more per chunk received
    RequestEach(i64),
    /// Cancel after this many chunks
    CancelAfter(usize),
}

/// Subscriber that forwards every callback to a channel.
pub(crate) struct Recorder {
    events: Sender<Event>,
    reaction: Reaction,
    subscription: Option<Subscription>,
    received: usize,
}

impl Recorder {
    pub(crate) fn new() -> (Self, Receiver<Event>) {
        Self::reacting(Reaction::Nothing)
    }

    pub(crate) fn reacting(reaction: Reaction) -> (Self, Receiver<Event>) {
        let (tx, rx) = channel::unbounded();
        (
            Self {
                events: tx,
                reaction,
                subscription: None,
                received: 0,
            },
            rx,
        )
    }
}

impl ChunkSubscriber for Recorder {
    fn on_subscribe(&mut self, subscription: &Subscription) {
        let _ = self.events.send(Event::Subscribed);
        match self.reaction {
            Reaction::RequestOnSubscribe(n) | Reaction::RequestEach(n) => {
                subscription.request(n).unwrap();
            }
            Reaction::Nothing | Reaction::CancelAfter(_) => {}
        }
        self.subscription = Some(subscription.clone());
    }

    fn on_chunk(&mut self, chunk: Chunk) {
        self.received += 1;
        let _ = self.events.send(Event::Chunk(chunk.to_vec()));

        let Some(subscription) = &self.subscription else {
            return;
        };
        match self.reaction {
            Reaction::RequestEach(_) => subscription.request(1).unwrap(),
            Reaction::CancelAfter(limit) if self.received >= limit => subscription.cancel(),
            _ => {}
        }
    }

    fn on_complete(&mut self) {
        let _ = self.events.send(Event::Complete);
    }

    fn on_error(&mut self, error: StreamError) {
        let _ = self.events.send(Event::Error(error.to_string()));
    }
}

/// Collect events until a terminal one arrives.
///
/// # Panics
/// Panics if no terminal event arrives within [`EVENT_TIMEOUT`].
pub(crate) fn until_terminal(events: &Receiver<Event>) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        match events.recv_timeout(EVENT_TIMEOUT) {
            Ok(event) => {
                let terminal = event.is_terminal();
                seen.push(event);
                if terminal {
                    return seen;
                }
            }
            Err(err) => panic!("no terminal event after {seen:?}: {err:?}"),
        }
    }
}

/// Collect exactly `n` events.
pub(crate) fn take_events(events: &Receiver<Event>, n: usize) -> Vec<Event> {
    (0..n)
        .map(|i| {
            events
                .recv_timeout(EVENT_TIMEOUT)
                .unwrap_or_else(|err| panic!("event {i} of {n} missing: {err:?}"))
        })
        .collect()
}

/// Assert that no event arrives for [`QUIET_PERIOD`].
pub(crate) fn assert_quiet(events: &Receiver<Event>) {
    match events.recv_timeout(QUIET_PERIOD) {
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        Ok(event) => panic!("unexpected event {event:?}"),
    }
}

/// Only the chunk sizes from an event list.
pub(crate) fn chunk_sizes(events: &[Event]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Chunk(bytes) => Some(bytes.len()),
            _ => None,
        })
        .collect()
}
