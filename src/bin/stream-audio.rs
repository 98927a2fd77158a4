//! Stream audio from a file, stdin, a tone or the microphone through the
//! demand-driven adapter into a sink.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use audio_stream_adapter::intercept::{FaultConfig, FaultInjector, InterceptedSource};
use audio_stream_adapter::progress::{NullProgressReporter, ProgressInfo, ProgressTracker};
use audio_stream_adapter::streaming::{
    AdapterConfig, ChunkPublisher, ChunkSource, ChunkStream, FileSource, ReaderSource,
    StreamError, StreamErrorMetrics, StreamMetrics, ToneConfig, ToneSource,
};

/// How long a cancelled run waits for the worker to leave its current read.
const JOIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "stream-audio", version)]
#[command(about = "Stream audio bytes through a backpressure-aware adapter")]
struct Cli {
    #[command(subcommand)]
    source: SourceArg,

    /// Chunk size in bytes.
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Chunks kept requested ahead of the sink.
    #[arg(long, global = true)]
    prefetch: Option<usize>,

    /// Write the streamed bytes here instead of discarding them.
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// Probability that a source read fails.
    #[arg(long, global = true, default_value_t = 0.0)]
    fault_rate: f64,

    /// Delay reads at random by up to this many milliseconds.
    #[arg(long, global = true, default_value_t = 0)]
    max_delay_ms: u64,

    /// Seed for reproducible fault injection.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Adapter configuration file (JSON). Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Stop streaming after this many seconds.
    #[arg(long, global = true)]
    max_seconds: Option<f64>,

    /// Hide the progress bar.
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum SourceArg {
    /// Stream a file.
    File { path: PathBuf },
    /// Stream standard input until it closes.
    Stdin,
    /// Stream a synthetic 16-bit PCM sine tone.
    Tone {
        #[arg(long, default_value_t = 440.0)]
        frequency: f64,
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,
        #[arg(long, default_value_t = 16000)]
        sample_rate: u32,
        /// Produce audio no faster than real time.
        #[arg(long)]
        realtime: bool,
    },
    /// Capture the default input device until Ctrl-C or `--max-seconds`.
    Mic,
}

struct RunSummary {
    info: ProgressInfo,
    metrics: StreamMetrics,
    errors: StreamErrorMetrics,
    interrupted: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();

    match run(cli).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let config = adapter_config(&cli)?;
    let limit = cli.max_seconds.map(seconds_arg).transpose()?;
    let source = open_source(&cli.source, config.chunk_size)?;
    let source = with_faults(source, &cli)?;
    let total_bytes = source.size_hint();

    let mut sink = open_sink(cli.output.as_deref()).await?;
    let mut progress = if cli.quiet {
        ProgressTracker::new(NullProgressReporter, total_bytes)
    } else {
        ProgressTracker::progress_bar(total_bytes)
    };

    let interrupt = CancellationToken::new();
    tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        }
    });

    let deadline = async move {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut chunks = ChunkPublisher::with_config(source, config)?.into_stream()?;
    tracing::debug!(?total_bytes, "streaming started");
    progress.start();

    let mut interrupted = false;
    let mut timed_out = false;
    let mut failure: Option<StreamError> = None;
    loop {
        tokio::select! {
            _ = interrupt.cancelled() => {
                chunks.cancel();
                interrupted = true;
                break;
            }
            _ = &mut deadline => {
                chunks.cancel();
                timed_out = true;
                break;
            }
            next = chunks.next() => match next {
                Some(Ok(chunk)) => {
                    if let Err(err) = sink.write_all(&chunk).await {
                        chunks.cancel();
                        failure = Some(StreamError::sink(err.to_string()));
                        break;
                    }
                    progress.record_chunk(chunk.len());
                }
                Some(Err(err)) => {
                    failure = Some(err);
                    break;
                }
                None => break,
            },
        }
    }

    let info = progress.finish();
    let metrics = chunks.subscription().metrics();
    let mut errors = chunks.subscription().error_metrics();
    if let Some(err @ StreamError::Sink(_)) = &failure {
        errors.record_error(err);
    }

    let cancelled = interrupted || timed_out || failure.is_some();
    sink.flush().await.context("failed to flush output")?;
    release_source(chunks, cancelled).await?;

    if let Some(err) = failure {
        return Err(err).context(format!(
            "stream failed after {} chunks ({} bytes, {} read errors, {} injected faults)",
            info.chunks, info.bytes, errors.read_errors, errors.injected_errors
        ));
    }

    Ok(RunSummary {
        info,
        metrics,
        errors,
        interrupted,
    })
}

/// Join the worker and drop the source away from the runtime.
///
/// A cancelled worker can sit inside a read that never returns, such as stdin
/// held open by another process. In that case the join only gets
/// [`JOIN_GRACE`] and the thread is left behind when the process exits.
async fn release_source(chunks: ChunkStream<BoxedSource>, cancelled: bool) -> Result<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name("stream-audio-join".into())
        .spawn(move || {
            let _ = tx.send(chunks.into_source().map(drop));
        })
        .context("spawn join thread")?;

    if !cancelled {
        return Ok(rx.await.context("join thread exited early")??);
    }
    match tokio::time::timeout(JOIN_GRACE, rx).await {
        Ok(joined) => Ok(joined.context("join thread exited early")??),
        Err(_) => {
            tracing::warn!(grace = ?JOIN_GRACE, "worker still inside a read, not waiting for it");
            Ok(())
        }
    }
}

fn adapter_config(cli: &Cli) -> Result<AdapterConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AdapterConfig::default(),
    };

    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(prefetch) = cli.prefetch {
        config.prefetch = prefetch;
    }
    config.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<AdapterConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse config file {}", path.display()))
}

type BoxedSource = Box<dyn ChunkSource>;

fn open_source(source: &SourceArg, chunk_size: usize) -> Result<BoxedSource> {
    match source {
        SourceArg::File { path } => {
            let file = FileSource::open(path, chunk_size)
                .with_context(|| format!("open {}", path.display()))?;
            Ok(Box::new(file))
        }
        SourceArg::Stdin => Ok(Box::new(ReaderSource::new(std::io::stdin(), chunk_size)?)),
        SourceArg::Tone {
            frequency,
            seconds,
            sample_rate,
            realtime,
        } => {
            let config = ToneConfig {
                frequency: *frequency,
                sample_rate: *sample_rate,
                duration: Some(seconds_arg(*seconds)?),
                realtime: *realtime,
                ..Default::default()
            };
            Ok(Box::new(ToneSource::new(config, chunk_size)?))
        }
        SourceArg::Mic => open_microphone(chunk_size),
    }
}

#[cfg(feature = "microphone")]
fn open_microphone(chunk_size: usize) -> Result<BoxedSource> {
    use audio_stream_adapter::streaming::MicrophoneSource;

    let mic = MicrophoneSource::open_default(chunk_size).context("open default input device")?;
    let format = mic.format();
    tracing::info!(
        sample_rate = format.sample_rate,
        channels = format.channels,
        "capturing from default input device"
    );
    Ok(Box::new(mic))
}

#[cfg(not(feature = "microphone"))]
fn open_microphone(_chunk_size: usize) -> Result<BoxedSource> {
    anyhow::bail!("built without microphone support; rebuild with `--features microphone`")
}

fn seconds_arg(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("invalid duration of {seconds} seconds"))
}

fn with_faults(source: BoxedSource, cli: &Cli) -> Result<BoxedSource> {
    if cli.fault_rate == 0.0 && cli.max_delay_ms == 0 {
        return Ok(source);
    }

    let config = FaultConfig {
        failure_probability: cli.fault_rate,
        delay_probability: if cli.max_delay_ms > 0 { 1.0 } else { 0.0 },
        max_delay: Duration::from_millis(cli.max_delay_ms),
        seed: cli.seed,
    };
    let injector = FaultInjector::new(config)?;
    tracing::info!(
        fault_rate = cli.fault_rate,
        max_delay_ms = cli.max_delay_ms,
        seed = ?cli.seed,
        "fault injection enabled"
    );
    Ok(Box::new(InterceptedSource::new(source, injector)))
}

async fn open_sink(output: Option<&Path>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("create output file {}", path.display()))?;
            Ok(Box::new(tokio::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(tokio::io::sink())),
    }
}

fn print_summary(summary: &RunSummary) {
    let RunSummary {
        info,
        metrics,
        errors,
        interrupted,
    } = summary;

    let status = if *interrupted {
        "interrupted".yellow().bold()
    } else {
        "done".green().bold()
    };
    println!(
        "{status} {} chunks, {} bytes in {:.2?} ({:.1} KiB/s)",
        info.chunks,
        info.bytes,
        info.elapsed,
        info.bytes_per_second() / 1024.0
    );
    println!(
        "  {} {} requests ({} rejected), {} outstanding, avg chunk {:.0} bytes",
        "demand:".dimmed(),
        metrics.requests,
        metrics.rejected_requests,
        metrics.outstanding_demand,
        metrics.average_chunk_size()
    );
    if errors.total_errors > 0 {
        println!(
            "  {} {} total, {} demand violations",
            "errors:".dimmed(),
            errors.total_errors,
            errors.demand_violations
        );
    }
}
