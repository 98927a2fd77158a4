//! Progress tracking for streaming transfers.
//!
//! Reporters are driven by whoever consumes the chunks; they never touch the
//! stream itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Snapshot of a transfer in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Chunks consumed so far
    pub chunks: u64,
    /// Bytes consumed so far
    pub bytes: u64,
    /// Total bytes the source will produce, if known
    pub total_bytes: Option<u64>,
    /// Time since the transfer started
    pub elapsed: Duration,
}

impl ProgressInfo {
    /// Fraction complete (0.0 to 1.0), if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.bytes as f64 / total as f64).min(1.0)
            }
        })
    }

    /// Average throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Estimated time until the transfer completes.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let total = self.total_bytes?;
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }
}

/// Trait for reporting transfer progress.
pub trait ProgressReporter: Send + Sync {
    /// Report progress information.
    fn report_progress(&self, info: &ProgressInfo);

    /// Report that the transfer has started.
    fn start(&self, total_bytes: Option<u64>) {
        let info = ProgressInfo {
            chunks: 0,
            bytes: 0,
            total_bytes,
            elapsed: Duration::ZERO,
        };
        self.report_progress(&info);
    }

    /// Report that the transfer has ended.
    fn finish(&self, info: &ProgressInfo) {
        let _ = info;
    }
}

/// Progress bar reporter using indicatif.
#[cfg(feature = "cli")]
#[derive(Debug)]
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

#[cfg(feature = "cli")]
impl ProgressBarReporter {
    /// Create a bar for a transfer of `total_bytes`, or a spinner if unknown.
    ///
    /// The bar draws to stdout; stderr carries the log output.
    pub fn new(total_bytes: Option<u64>) -> Self {
        let bar = ProgressBar::with_draw_target(total_bytes, ProgressDrawTarget::stdout());
        let style = match total_bytes {
            Some(_) => ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
            None => ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        };
        bar.set_style(style);

        Self { bar }
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for ProgressBarReporter {
    fn report_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.bytes);
        self.bar.set_message(format!("{} chunks", info.chunks));
    }

    fn start(&self, _total_bytes: Option<u64>) {
        // Bar is already sized
    }

    fn finish(&self, info: &ProgressInfo) {
        self.bar.set_position(info.bytes);
        self.bar
            .finish_with_message(format!("{} chunks streamed", info.chunks));
    }
}

/// Callback-based progress reporter.
#[derive(Debug)]
pub struct CallbackProgressReporter<F> {
    callback: F,
}

impl<F> CallbackProgressReporter<F>
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    /// Create a new callback progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgressReporter<F>
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn report_progress(&self, info: &ProgressInfo) {
        (self.callback)(info);
    }
}

/// Null progress reporter that does nothing.
#[derive(Debug)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn report_progress(&self, _info: &ProgressInfo) {}
}

/// Accumulates consumed chunks and forwards snapshots to a reporter.
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    total_bytes: Option<u64>,
    chunks: u64,
    bytes: u64,
    start_time: Option<Instant>,
}

impl ProgressTracker {
    /// Create a tracker with a custom reporter.
    pub fn new<R: ProgressReporter + 'static>(reporter: R, total_bytes: Option<u64>) -> Self {
        Self {
            reporter: Arc::new(reporter),
            total_bytes,
            chunks: 0,
            bytes: 0,
            start_time: None,
        }
    }

    /// Create a progress bar tracker.
    #[cfg(feature = "cli")]
    pub fn progress_bar(total_bytes: Option<u64>) -> Self {
        Self::new(ProgressBarReporter::new(total_bytes), total_bytes)
    }

    /// Create a callback progress tracker.
    pub fn callback<F>(callback: F, total_bytes: Option<u64>) -> Self
    where
        F: Fn(&ProgressInfo) + Send + Sync + 'static,
    {
        Self::new(CallbackProgressReporter::new(callback), total_bytes)
    }

    /// Start tracking progress.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.reporter.start(self.total_bytes);
    }

    /// Record one consumed chunk of `len` bytes.
    pub fn record_chunk(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len as u64;
        let info = self.snapshot();
        self.reporter.report_progress(&info);
    }

    /// Finish tracking progress.
    pub fn finish(&self) -> ProgressInfo {
        let info = self.snapshot();
        self.reporter.finish(&info);
        info
    }

    /// Current progress.
    pub fn snapshot(&self) -> ProgressInfo {
        ProgressInfo {
            chunks: self.chunks,
            bytes: self.bytes,
            total_bytes: self.total_bytes,
            elapsed: self
                .start_time
                .map(|start| start.elapsed())
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("chunks", &self.chunks)
            .field("bytes", &self.bytes)
            .field("total_bytes", &self.total_bytes)
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(NullProgressReporter, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_info_calculation() {
        let info = ProgressInfo {
            chunks: 5,
            bytes: 5120,
            total_bytes: Some(10240),
            elapsed: Duration::from_secs(2),
        };

        assert_eq!(info.fraction(), Some(0.5));
        assert_eq!(info.bytes_per_second(), 2560.0);
        assert_eq!(info.estimated_remaining(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_unknown_total_has_no_fraction() {
        let info = ProgressInfo {
            chunks: 1,
            bytes: 10,
            total_bytes: None,
            elapsed: Duration::ZERO,
        };

        assert_eq!(info.fraction(), None);
        assert_eq!(info.bytes_per_second(), 0.0);
        assert_eq!(info.estimated_remaining(), None);
    }

    #[test]
    fn test_callback_tracker_sees_every_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut tracker = ProgressTracker::callback(
            move |info: &ProgressInfo| sink.lock().unwrap().push(info.bytes),
            Some(2548),
        );
        tracker.start();
        for len in [1024, 1024, 500] {
            tracker.record_chunk(len);
        }
        let last = tracker.finish();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1024, 2048, 2548]);
        assert_eq!(last.chunks, 3);
        assert_eq!(last.fraction(), Some(1.0));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_progress_bar_follows_reported_bytes() {
        let reporter = ProgressBarReporter::new(Some(2548));
        assert_eq!(reporter.bar.length(), Some(2548));

        let mut info = ProgressInfo {
            chunks: 2,
            bytes: 2048,
            total_bytes: Some(2548),
            elapsed: Duration::from_millis(10),
        };
        reporter.report_progress(&info);
        assert_eq!(reporter.bar.position(), 2048);

        info.chunks = 3;
        info.bytes = 2548;
        reporter.finish(&info);
        assert_eq!(reporter.bar.position(), 2548);
        assert!(reporter.bar.is_finished());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_unknown_total_uses_spinner() {
        let reporter = ProgressBarReporter::new(None);
        assert_eq!(reporter.bar.length(), None);
    }
}
