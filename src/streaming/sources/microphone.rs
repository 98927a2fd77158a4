//! Default input device exposed as a blocking PCM line.
//!
//! `cpal` streams are not `Send` on every platform, so the capture stream is
//! built and kept alive on its own thread. Captured samples are converted to
//! 16-bit little-endian PCM and handed over through a bounded channel, which
//! the stream worker reads through an ordinary [`Read`] implementation.

use crate::streaming::{
    chunk::ReadOutcome,
    error::{StreamError, StreamResult},
    sources::file::ReaderSource,
    traits::ChunkSource,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

/// Capture buffers held before the oldest audio starts being dropped.
const CAPTURE_QUEUE_DEPTH: usize = 64;

/// Format reported by the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
}

/// Blocking reader over the captured PCM bytes.
///
/// Returns end of input once capture has stopped and every buffered byte
/// has been read.
#[derive(Debug)]
pub struct CaptureLine {
    frames: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl Read for CaptureLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.offset >= self.pending.len() {
            match self.frames.recv() {
                Ok(frame) => {
                    self.pending = frame;
                    self.offset = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

/// A chunk source that records from the default input device.
///
/// Capture stops when the source is dropped or [`stop`](Self::stop) is
/// called; the remaining buffered audio is still delivered before end of
/// source.
#[derive(Debug)]
pub struct MicrophoneSource {
    reader: ReaderSource<CaptureLine>,
    format: CaptureFormat,
    dropped_buffers: Arc<AtomicU64>,
    stop: Option<Sender<()>>,
    capture_thread: Option<JoinHandle<()>>,
}

impl MicrophoneSource {
    /// Start capturing from the default input device.
    pub fn open_default(chunk_size: usize) -> StreamResult<Self> {
        let (frame_tx, frame_rx) = channel::bounded(CAPTURE_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = channel::bounded(1);
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let dropped_buffers = Arc::new(AtomicU64::new(0));
        let dropped = Arc::clone(&dropped_buffers);

        let capture_thread = thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || {
                let stream = match build_capture_stream(frame_tx, dropped) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                // Blocks until the source is stopped or dropped.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("microphone capture stopped");
            })
            .map_err(|err| StreamError::WorkerSpawn(err.to_string()))?;

        let format = ready_rx
            .recv()
            .map_err(|_| StreamError::device("capture thread exited during setup"))??;

        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "microphone capture started"
        );

        let line = CaptureLine {
            frames: frame_rx,
            pending: Vec::new(),
            offset: 0,
        };

        Ok(Self {
            reader: ReaderSource::new(line, chunk_size)?,
            format,
            dropped_buffers,
            stop: Some(stop_tx),
            capture_thread: Some(capture_thread),
        })
    }

    /// Format of the PCM bytes this source produces.
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Capture buffers dropped because the reader fell behind.
    pub fn dropped_buffers(&self) -> u64 {
        self.dropped_buffers.load(Ordering::Relaxed)
    }

    /// Stop capturing. Audio already buffered is still readable.
    pub fn stop(&mut self) {
        if self.stop.take().is_some() {
            if let Some(handle) = self.capture_thread.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ChunkSource for MicrophoneSource {
    fn read_chunk(&mut self) -> StreamResult<ReadOutcome> {
        self.reader.read_chunk()
    }

    fn chunk_size(&self) -> usize {
        self.reader.chunk_size()
    }
}

fn build_capture_stream(
    frames: Sender<Vec<u8>>,
    dropped: Arc<AtomicU64>,
) -> StreamResult<(cpal::Stream, CaptureFormat)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| StreamError::device("no input device available"))?;
    let supported = device
        .default_input_config()
        .map_err(|err| StreamError::device(err.to_string()))?;

    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let format = CaptureFormat {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let bytes = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                forward(&frames, &dropped, bytes);
            },
            log_capture_error,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let bytes = data
                    .iter()
                    .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
                    .flat_map(i16::to_le_bytes)
                    .collect();
                forward(&frames, &dropped, bytes);
            },
            log_capture_error,
            None,
        ),
        other => {
            return Err(StreamError::device(format!(
                "unsupported capture sample format {other:?}"
            )));
        }
    }
    .map_err(|err| StreamError::device(err.to_string()))?;

    stream
        .play()
        .map_err(|err| StreamError::device(err.to_string()))?;

    Ok((stream, format))
}

fn forward(frames: &Sender<Vec<u8>>, dropped: &AtomicU64, bytes: Vec<u8>) {
    match frames.try_send(bytes) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(_)) => {
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn log_capture_error(err: cpal::StreamError) {
    tracing::warn!(error = %err, "capture stream error");
}
