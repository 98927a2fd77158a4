//! Demonstration of demand-driven streaming from a synthetic tone.
//!
//! A callback subscriber asks for one chunk at a time, the way a streaming
//! upload would after each frame is accepted.

use audio_stream_adapter::{
    ProgressInfo, ProgressTracker, ReadLogger,
    intercept::InterceptedSource,
    streaming::{Chunk, ChunkPublisher, ChunkSubscriber, StreamError, Subscription, ToneSource},
};
use std::sync::mpsc;
use std::time::Duration;

enum Outcome {
    Done(ProgressInfo),
    Failed(StreamError),
}

/// Requests the next chunk only after the previous one was handled.
struct OneAtATime {
    subscription: Option<Subscription>,
    progress: ProgressTracker,
    done: mpsc::Sender<Outcome>,
}

impl ChunkSubscriber for OneAtATime {
    fn on_subscribe(&mut self, subscription: &Subscription) {
        self.progress.start();
        if subscription.request(1).is_ok() {
            self.subscription = Some(subscription.clone());
        }
    }

    fn on_chunk(&mut self, chunk: Chunk) {
        self.progress.record_chunk(chunk.len());
        if let Some(subscription) = &self.subscription {
            let _ = subscription.request(1);
        }
    }

    fn on_complete(&mut self) {
        let _ = self.done.send(Outcome::Done(self.progress.finish()));
    }

    fn on_error(&mut self, error: StreamError) {
        let _ = self.done.send(Outcome::Failed(error));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎵 Audio Stream Adapter - Demand-Driven Streaming Demo");

    // Two seconds of 440 Hz at 16 kHz mono, in 100 ms chunks
    let tone = ToneSource::sine(440.0, Duration::from_secs(2), 3200)?;
    let logger = ReadLogger::warn_slower_than(Duration::from_millis(5));
    let source = InterceptedSource::new(tone, logger);
    let mut publisher = ChunkPublisher::new(source);
    println!("✅ Created publisher over a 2 s tone");

    let (tx, rx) = mpsc::channel();
    let progress = ProgressTracker::callback(
        |info: &ProgressInfo| {
            if info.chunks > 0 && info.chunks % 5 == 0 {
                println!("  📦 {} chunks, {} bytes", info.chunks, info.bytes);
            }
        },
        Some(64_000),
    );

    let worker = publisher.subscribe(OneAtATime {
        subscription: None,
        progress,
        done: tx,
    })?;

    match rx.recv()? {
        Outcome::Done(info) => {
            println!("\n✨ Stream complete!");
            println!("   • {} chunks, {} bytes", info.chunks, info.bytes);
            println!("   • {:.0} bytes/s", info.bytes_per_second());
        }
        Outcome::Failed(err) => println!("\n❌ Stream failed: {err}"),
    }

    let metrics = worker.subscription().metrics();
    let (_tone, logger) = worker.join()?.into_parts();
    drop(logger);

    println!(
        "   • {} requests, average chunk {:.0} bytes",
        metrics.requests,
        metrics.average_chunk_size()
    );
    println!("🔗 Source handed back to the caller after the worker exited");

    Ok(())
}
