//! Chunk reader over blocking byte sources such as files, pipes and capture lines.

use crate::streaming::{
    chunk::{Chunk, ReadOutcome},
    error::{StreamError, StreamResult},
    stream::ChunkPublisher,
    traits::{AdapterConfig, ChunkSource},
};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Reads fixed-size chunks from any blocking [`Read`] implementation.
///
/// Short reads are retried until the chunk is full or the reader reports end
/// of input, so every chunk except the last holds exactly `chunk_size` bytes.
/// An I/O error that interrupts a partially filled chunk is held back: the
/// bytes read so far are returned first and the error on the following call.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
    total_bytes: Option<u64>,
    bytes_read: u64,
    chunks_read: u64,
    pending_error: Option<io::Error>,
    exhausted: bool,
}

impl<R: Read + Send> ReaderSource<R> {
    /// Wrap `reader`, producing chunks of at most `chunk_size` bytes.
    pub fn new(reader: R, chunk_size: usize) -> StreamResult<Self> {
        if chunk_size == 0 {
            return Err(StreamError::invalid_config("chunk_size must be > 0"));
        }

        Ok(Self {
            reader,
            chunk_size,
            total_bytes: None,
            bytes_read: 0,
            chunks_read: 0,
            pending_error: None,
            exhausted: false,
        })
    }

    /// Record the total length of the input, used for progress reporting.
    pub fn with_total_bytes(mut self, total_bytes: u64) -> Self {
        self.total_bytes = Some(total_bytes);
        self
    }

    /// Bytes read from the underlying reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Chunks produced so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    /// Check if end of input has been seen.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fraction of the input consumed, if the total length is known.
    pub fn progress(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.bytes_read as f64 / total as f64).min(1.0)
            }
        })
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Mutably borrow the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Give the underlying reader back so the caller can close it.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl ReaderSource<File> {
    /// Open `path` for chunked reading.
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> StreamResult<Self> {
        let file = File::open(path.as_ref())?;
        let total_bytes = file.metadata().map(|m| m.len()).ok();

        let source = Self::new(file, chunk_size)?;
        Ok(match total_bytes {
            Some(total) => source.with_total_bytes(total),
            None => source,
        })
    }
}

impl<R: Read + Send> ChunkSource for ReaderSource<R> {
    fn read_chunk(&mut self) -> StreamResult<ReadOutcome> {
        if let Some(err) = self.pending_error.take() {
            return Err(StreamError::Read(err));
        }
        if self.exhausted {
            return Ok(ReadOutcome::EndOfSource);
        }

        let mut buffer = vec![0u8; self.chunk_size];
        let mut filled = 0;

        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if filled == 0 => return Err(StreamError::Read(err)),
                Err(err) => {
                    self.pending_error = Some(err);
                    break;
                }
            }
        }

        if filled == 0 {
            return Ok(ReadOutcome::EndOfSource);
        }

        buffer.truncate(filled);
        self.bytes_read += filled as u64;
        self.chunks_read += 1;

        Ok(ReadOutcome::Chunk(Chunk::new(buffer)))
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn size_hint(&self) -> Option<u64> {
        self.total_bytes
    }
}

impl<R: Read + Send + 'static> ChunkPublisher<ReaderSource<R>> {
    /// Create a publisher that reads `reader` in chunks of `config.chunk_size`.
    pub fn from_reader(reader: R, config: AdapterConfig) -> StreamResult<Self> {
        let source = ReaderSource::new(reader, config.chunk_size)?;
        Self::with_config(source, config)
    }
}

impl ChunkPublisher<ReaderSource<File>> {
    /// Create a publisher that streams the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: AdapterConfig) -> StreamResult<Self> {
        let source = ReaderSource::open(path, config.chunk_size)?;
        Self::with_config(source, config)
    }
}
