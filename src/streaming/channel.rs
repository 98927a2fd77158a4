//! Async consumption of a publisher through [`futures::Stream`].

use super::{
    chunk::Chunk,
    error::{StreamError, StreamResult},
    stream::{ChunkPublisher, StreamWorker, Subscription},
    traits::{ChunkSource, ChunkSubscriber},
};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Debug)]
enum StreamEvent {
    Chunk(Chunk),
    Complete,
    Error(StreamError),
}

/// Forwards worker callbacks into a channel sized to the prefetch window.
struct ChannelSubscriber {
    events: mpsc::Sender<StreamEvent>,
}

impl ChannelSubscriber {
    fn forward(&self, event: StreamEvent) {
        // Outstanding demand never exceeds the channel capacity, so this only
        // waits if the stream was dropped mid-delivery, in which case it fails.
        if self.events.blocking_send(event).is_err() {
            tracing::trace!("chunk stream dropped before delivery");
        }
    }
}

impl ChunkSubscriber for ChannelSubscriber {
    fn on_chunk(&mut self, chunk: Chunk) {
        self.forward(StreamEvent::Chunk(chunk));
    }

    fn on_complete(&mut self) {
        self.forward(StreamEvent::Complete);
    }

    fn on_error(&mut self, error: StreamError) {
        self.forward(StreamEvent::Error(error));
    }
}

/// Pull-style async view of a publisher.
///
/// Keeps `prefetch` chunks requested ahead of the consumer and asks for one
/// more each time an item is taken, so the source is never read further than
/// the consumer can absorb. A read failure is yielded once as `Some(Err(_))`
/// and the stream then ends. Dropping the stream cancels the subscription.
#[derive(Debug)]
pub struct ChunkStream<S> {
    events: mpsc::Receiver<StreamEvent>,
    worker: StreamWorker<S>,
    finished: bool,
}

impl<S: ChunkSource + 'static> ChunkStream<S> {
    /// Subscribe to `publisher` and start prefetching.
    pub fn new(publisher: &mut ChunkPublisher<S>) -> StreamResult<Self> {
        let prefetch = publisher.config().prefetch;
        let (tx, rx) = mpsc::channel(prefetch + 1);

        let worker = publisher.subscribe(ChannelSubscriber { events: tx })?;
        worker.request(prefetch as i64)?;

        Ok(Self {
            events: rx,
            worker,
            finished: false,
        })
    }
}

impl<S> ChunkStream<S> {
    /// The underlying subscription.
    pub fn subscription(&self) -> &Subscription {
        self.worker.subscription()
    }

    /// Stop the stream early. Subsequent polls return `None`.
    pub fn cancel(&mut self) {
        self.worker.cancel();
        self.finished = true;
        self.events.close();
    }

    /// Cancel if still running, wait for the worker and take the source back.
    ///
    /// Blocks the calling thread until any in-flight read returns; call it
    /// from a blocking context.
    pub fn into_source(self) -> StreamResult<S> {
        if !self.finished {
            self.worker.cancel();
        }
        self.worker.join()
    }
}

impl<S> Stream for ChunkStream<S> {
    type Item = StreamResult<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.events.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamEvent::Chunk(chunk))) => {
                if let Err(err) = this.worker.request(1) {
                    tracing::warn!(error = %err, "failed to replenish demand");
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(StreamEvent::Error(err))) => {
                this.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(Some(StreamEvent::Complete)) | Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl<S: ChunkSource + 'static> ChunkPublisher<S> {
    /// Subscribe and consume the publisher as an async [`Stream`].
    pub fn into_stream(mut self) -> StreamResult<ChunkStream<S>> {
        ChunkStream::new(&mut self)
    }
}
