//! Hooks wrapped around every source read.
//!
//! An interceptor receives the read it is guarding as a callable and decides
//! whether to run it, delay it, replace its result or fail it outright. This
//! is how faults are injected into a pipeline without touching the source or
//! the consumer.

use crate::streaming::{
    chunk::ReadOutcome,
    error::{StreamError, StreamResult},
    traits::ChunkSource,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// The guarded read, as handed to an interceptor.
pub type ReadCall<'a> = &'a mut dyn FnMut() -> StreamResult<ReadOutcome>;

/// A decorator around a single source read.
pub trait ReadInterceptor: Send {
    /// Handle read number `call` (1-based).
    ///
    /// Implementations normally invoke `read` once and return its result,
    /// possibly after a delay or with the result replaced.
    fn intercept(&mut self, call: u64, read: ReadCall<'_>) -> StreamResult<ReadOutcome>;
}

impl<F> ReadInterceptor for F
where
    F: FnMut(u64, ReadCall<'_>) -> StreamResult<ReadOutcome> + Send,
{
    fn intercept(&mut self, call: u64, read: ReadCall<'_>) -> StreamResult<ReadOutcome> {
        self(call, read)
    }
}

/// A source whose reads all pass through an interceptor.
#[derive(Debug)]
pub struct InterceptedSource<S, I> {
    inner: S,
    interceptor: I,
    calls: u64,
}

impl<S: ChunkSource, I: ReadInterceptor> InterceptedSource<S, I> {
    /// Wrap `inner` so every read goes through `interceptor`.
    pub fn new(inner: S, interceptor: I) -> Self {
        Self {
            inner,
            interceptor,
            calls: 0,
        }
    }

    /// Number of reads attempted so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Borrow the interceptor.
    pub fn interceptor(&self) -> &I {
        &self.interceptor
    }

    /// Split back into the source and the interceptor.
    pub fn into_parts(self) -> (S, I) {
        (self.inner, self.interceptor)
    }
}

impl<S: ChunkSource, I: ReadInterceptor> ChunkSource for InterceptedSource<S, I> {
    fn read_chunk(&mut self) -> StreamResult<ReadOutcome> {
        self.calls += 1;
        let inner = &mut self.inner;
        self.interceptor
            .intercept(self.calls, &mut || inner.read_chunk())
    }

    fn chunk_size(&self) -> usize {
        self.inner.chunk_size()
    }

    fn size_hint(&self) -> Option<u64> {
        self.inner.size_hint()
    }
}

/// Configuration for [`FaultInjector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Chance that a read fails without touching the source
    pub failure_probability: f64,
    /// Chance that a read is delayed before running
    pub delay_probability: f64,
    /// Upper bound of an injected delay
    pub max_delay: Duration,
    /// Seed for reproducible fault sequences
    pub seed: Option<u64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_probability: 0.0,
            delay_probability: 0.0,
            max_delay: Duration::from_millis(100),
            seed: None,
        }
    }
}

impl FaultConfig {
    /// Fail reads with the given probability and never delay.
    pub fn failures(probability: f64) -> Self {
        Self {
            failure_probability: probability,
            ..Default::default()
        }
    }

    /// Check both probabilities are within `0.0..=1.0`.
    pub fn validate(&self) -> StreamResult<()> {
        for (name, value) in [
            ("failure_probability", self.failure_probability),
            ("delay_probability", self.delay_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StreamError::invalid_config(format!(
                    "{name} {value} outside 0.0..=1.0"
                )));
            }
        }
        Ok(())
    }
}

/// Randomly delays or fails reads.
#[derive(Debug)]
pub struct FaultInjector {
    config: FaultConfig,
    rng: fastrand::Rng,
    injected_failures: u64,
    injected_delays: u64,
}

impl FaultInjector {
    /// Create an injector, seeded from the config when a seed is given.
    pub fn new(config: FaultConfig) -> StreamResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Ok(Self {
            config,
            rng,
            injected_failures: 0,
            injected_delays: 0,
        })
    }

    /// Reads failed by this injector.
    pub fn injected_failures(&self) -> u64 {
        self.injected_failures
    }

    /// Reads delayed by this injector.
    pub fn injected_delays(&self) -> u64 {
        self.injected_delays
    }

    fn roll(&mut self, probability: f64) -> bool {
        probability > 0.0 && self.rng.f64() < probability
    }
}

impl ReadInterceptor for FaultInjector {
    fn intercept(&mut self, call: u64, read: ReadCall<'_>) -> StreamResult<ReadOutcome> {
        if self.roll(self.config.delay_probability) {
            let max_ms = self.config.max_delay.as_millis() as u64;
            let delay = Duration::from_millis(self.rng.u64(0..=max_ms));
            self.injected_delays += 1;
            tracing::debug!(call, delay_ms = delay.as_millis() as u64, "injecting read delay");
            std::thread::sleep(delay);
        }

        if self.roll(self.config.failure_probability) {
            self.injected_failures += 1;
            tracing::warn!(call, "injecting read failure");
            return Err(StreamError::injected(call));
        }

        read()
    }
}

/// Traces every read with its outcome and duration.
#[derive(Debug, Default)]
pub struct ReadLogger {
    slow_threshold: Option<Duration>,
}

impl ReadLogger {
    /// Create a logger that traces every read at `trace` level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also warn about reads slower than `threshold`.
    pub fn warn_slower_than(threshold: Duration) -> Self {
        Self {
            slow_threshold: Some(threshold),
        }
    }
}

impl ReadInterceptor for ReadLogger {
    fn intercept(&mut self, call: u64, read: ReadCall<'_>) -> StreamResult<ReadOutcome> {
        let started = Instant::now();
        let result = read();
        let elapsed = started.elapsed();

        match &result {
            Ok(ReadOutcome::Chunk(chunk)) => {
                tracing::trace!(call, len = chunk.len(), ?elapsed, "read chunk")
            }
            Ok(ReadOutcome::EndOfSource) => tracing::trace!(call, ?elapsed, "end of source"),
            Err(err) => tracing::trace!(call, error = %err, ?elapsed, "read failed"),
        }

        if let Some(threshold) = self.slow_threshold {
            if elapsed > threshold {
                tracing::warn!(call, ?elapsed, "slow source read");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::chunk::Chunk;

    struct Counting {
        remaining: usize,
    }

    impl ChunkSource for Counting {
        fn read_chunk(&mut self) -> StreamResult<ReadOutcome> {
            if self.remaining == 0 {
                return Ok(ReadOutcome::EndOfSource);
            }
            self.remaining -= 1;
            Ok(ReadOutcome::Chunk(Chunk::new(vec![self.remaining as u8])))
        }
    }

    #[test]
    fn test_fault_config_validation() {
        assert!(FaultConfig::default().validate().is_ok());
        assert!(FaultConfig::failures(1.0).validate().is_ok());
        assert!(FaultConfig::failures(1.01).validate().is_err());

        let config = FaultConfig {
            delay_probability: -0.1,
            ..Default::default()
        };
        assert!(FaultInjector::new(config).is_err());
    }

    #[test]
    fn test_certain_failure_skips_the_read() {
        let injector = FaultInjector::new(FaultConfig::failures(1.0)).unwrap();
        let mut source = InterceptedSource::new(Counting { remaining: 3 }, injector);

        assert!(matches!(
            source.read_chunk(),
            Err(StreamError::Injected { call: 1 })
        ));
        let (inner, injector) = source.into_parts();
        assert_eq!(inner.remaining, 3);
        assert_eq!(injector.injected_failures(), 1);
    }

    #[test]
    fn test_zero_probability_is_transparent() {
        let injector = FaultInjector::new(FaultConfig::default()).unwrap();
        let mut source = InterceptedSource::new(Counting { remaining: 2 }, injector);

        assert!(source.read_chunk().unwrap().into_chunk().is_some());
        assert!(source.read_chunk().unwrap().into_chunk().is_some());
        assert!(source.read_chunk().unwrap().is_end());
        assert_eq!(source.calls(), 3);
        assert_eq!(source.interceptor().injected_failures(), 0);
    }

    #[test]
    fn test_seeded_injectors_agree() {
        let config = FaultConfig {
            failure_probability: 0.5,
            seed: Some(42),
            ..Default::default()
        };

        let run = |config: FaultConfig| {
            let injector = FaultInjector::new(config).unwrap();
            let mut source = InterceptedSource::new(Counting { remaining: 64 }, injector);
            (0..32)
                .map(|_| source.read_chunk().is_err())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(config.clone()), run(config));
    }

    #[test]
    fn test_function_interceptor_can_replace_result() {
        fn end_on_second(call: u64, read: ReadCall<'_>) -> StreamResult<ReadOutcome> {
            if call == 2 {
                Ok(ReadOutcome::EndOfSource)
            } else {
                read()
            }
        }

        let mut source = InterceptedSource::new(Counting { remaining: 5 }, end_on_second);

        assert!(source.read_chunk().unwrap().into_chunk().is_some());
        assert!(source.read_chunk().unwrap().is_end());
    }

    #[test]
    fn test_read_logger_passes_results_through() {
        let mut source = InterceptedSource::new(
            Counting { remaining: 1 },
            ReadLogger::warn_slower_than(Duration::from_secs(5)),
        );
        assert!(source.read_chunk().unwrap().into_chunk().is_some());
        assert!(source.read_chunk().unwrap().is_end());
    }
}
