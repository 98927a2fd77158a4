//! Synthetic PCM tone source.
//!
//! Produces 16-bit signed little-endian PCM, the format streaming speech
//! services expect, so pipelines can be exercised without a capture device.

use crate::streaming::{
    chunk::{Chunk, ReadOutcome},
    error::{StreamError, StreamResult},
    traits::ChunkSource,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const BYTES_PER_SAMPLE: usize = 2;

/// Configuration for the tone generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Tone frequency in Hz
    pub frequency: f64,
    /// Peak level, 0.0 to 1.0 of full scale
    pub amplitude: f64,
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Stop after this much audio; `None` runs forever
    pub duration: Option<Duration>,
    /// Sleep so chunks arrive no faster than real time, like a live line
    pub realtime: bool,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            amplitude: 0.5,
            sample_rate: 16000,
            channels: 1,
            duration: None,
            realtime: false,
        }
    }
}

impl ToneConfig {
    /// Bytes in one frame (one sample per channel).
    pub const fn frame_size(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Check the configuration for values the generator cannot work with.
    pub fn validate(&self) -> StreamResult<()> {
        if self.sample_rate == 0 {
            return Err(StreamError::invalid_config("sample_rate must be > 0"));
        }
        if self.channels == 0 {
            return Err(StreamError::invalid_config("channels must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(StreamError::invalid_config(format!(
                "amplitude {} outside 0.0..=1.0",
                self.amplitude
            )));
        }
        if !self.frequency.is_finite() || self.frequency < 0.0 {
            return Err(StreamError::invalid_config(format!(
                "frequency {} must be finite and non-negative",
                self.frequency
            )));
        }
        Ok(())
    }
}

/// A streaming source that synthesises a sine tone.
#[derive(Debug)]
pub struct ToneSource {
    config: ToneConfig,
    chunk_size: usize,
    phase: f64,
    frames_generated: u64,
    total_frames: Option<u64>,
    started: Option<Instant>,
}

impl ToneSource {
    /// Create a tone source producing chunks of at most `chunk_size` bytes.
    ///
    /// `chunk_size` is rounded down to a whole number of frames.
    pub fn new(config: ToneConfig, chunk_size: usize) -> StreamResult<Self> {
        config.validate()?;

        let frame_size = config.frame_size();
        let chunk_size = chunk_size - chunk_size % frame_size;
        if chunk_size == 0 {
            return Err(StreamError::invalid_config(format!(
                "chunk_size must hold at least one {frame_size}-byte frame"
            )));
        }

        let total_frames = config
            .duration
            .map(|d| (d.as_secs_f64() * f64::from(config.sample_rate)).round() as u64);

        Ok(Self {
            config,
            chunk_size,
            phase: 0.0,
            frames_generated: 0,
            total_frames,
            started: None,
        })
    }

    /// Create a bounded sine tone with default amplitude and format.
    pub fn sine(frequency: f64, duration: Duration, chunk_size: usize) -> StreamResult<Self> {
        Self::new(
            ToneConfig {
                frequency,
                duration: Some(duration),
                ..Default::default()
            },
            chunk_size,
        )
    }

    /// The generator configuration.
    pub fn config(&self) -> &ToneConfig {
        &self.config
    }

    /// Amount of audio generated so far.
    pub fn generated_time(&self) -> Duration {
        Duration::from_secs_f64(self.frames_generated as f64 / f64::from(self.config.sample_rate))
    }

    fn next_sample(&mut self) -> i16 {
        let value = (2.0 * std::f64::consts::PI * self.phase).sin() * self.config.amplitude;
        self.phase += self.config.frequency / f64::from(self.config.sample_rate);
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        (value.clamp(-1.0, 1.0) * f64::from(i16::MAX)) as i16
    }

    fn pace(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = self.generated_time();
        let elapsed = started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }
}

impl ChunkSource for ToneSource {
    fn read_chunk(&mut self) -> StreamResult<ReadOutcome> {
        let frame_size = self.config.frame_size();
        let mut frames = (self.chunk_size / frame_size) as u64;
        if let Some(total) = self.total_frames {
            frames = frames.min(total.saturating_sub(self.frames_generated));
        }
        if frames == 0 {
            return Ok(ReadOutcome::EndOfSource);
        }

        let mut data = Vec::with_capacity(frames as usize * frame_size);
        for _ in 0..frames {
            let sample = self.next_sample().to_le_bytes();
            for _ in 0..self.config.channels {
                data.extend_from_slice(&sample);
            }
        }
        self.frames_generated += frames;

        if self.config.realtime {
            self.pace();
        }

        Ok(ReadOutcome::Chunk(Chunk::new(data)))
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn size_hint(&self) -> Option<u64> {
        self.total_frames
            .map(|frames| frames * self.config.frame_size() as u64)
    }
}
