//! Transfer accounting: per-chunk speed, cumulative counters, and the
//! periodic smoothed speed samples written to the speed report.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::constants::DEFAULT_SPEED_INTERVAL;

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Bytes per second for `bytes` moved in `micros` microseconds (0 when no time elapsed).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn throughput(bytes: u64, micros: u64) -> f64 {
    if micros == 0 {
        return 0.0;
    }
    bytes as f64 * MICROS_PER_SEC / micros as f64
}

/// Remaining transfer time extrapolated from the average rate so far.
///
/// `(total - transferred) * elapsed / transferred`; `None` before the first byte.
#[must_use]
pub fn eta(total_size: u64, transferred: u64, elapsed_micros: u64) -> Option<Duration> {
    if transferred == 0 {
        return None;
    }
    let remaining = u128::from(total_size.saturating_sub(transferred));
    let micros = remaining * u128::from(elapsed_micros) / u128::from(transferred);
    Some(Duration::from_micros(
        u64::try_from(micros).unwrap_or(u64::MAX),
    ))
}

/// One chunk's contribution to the shared counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSample {
    /// Bytes in the chunk.
    pub bytes: u64,
    /// Microseconds since the previous chunk (or transfer start).
    pub elapsed_micros: u64,
    /// Chunk bytes over chunk time.
    pub speed: f64,
}

/// Times chunks against each other.
///
/// Elapsed time is the sum of inter-chunk deltas rather than a wall-clock
/// difference, so a stalled scheduler inflates one sample instead of
/// skewing the total.
#[derive(Debug, Clone, Copy)]
pub struct TransferMeter {
    last: Instant,
}

impl TransferMeter {
    /// Starts timing at `now`.
    #[must_use]
    pub fn start(now: Instant) -> Self {
        Self { last: now }
    }

    /// Records a chunk of `len` bytes that arrived at `now`.
    pub fn record(&mut self, len: usize, now: Instant) -> ChunkSample {
        let delta = now.saturating_duration_since(self.last);
        self.last = now;
        let elapsed_micros = u64::try_from(delta.as_micros()).unwrap_or(u64::MAX);
        let bytes = len as u64;
        ChunkSample {
            bytes,
            elapsed_micros,
            speed: throughput(bytes, elapsed_micros),
        }
    }
}

/// Receives smoothed throughput samples in bytes per second.
///
/// Called synchronously from the transfer's chunk callback, at most once per
/// sampling interval plus the two bookends. Implementations must return
/// quickly.
pub trait SpeedSink: Send + Sync + fmt::Debug {
    /// Records one sample.
    fn record(&self, bytes_per_sec: f64);
}

/// Where and how often to emit speed samples.
#[derive(Debug, Clone)]
pub struct SpeedTelemetry {
    /// Sample destination.
    pub sink: Arc<dyn SpeedSink>,
    /// Minimum time between periodic samples.
    pub interval: Duration,
}

impl SpeedTelemetry {
    /// Telemetry with the default 10 second interval.
    #[must_use]
    pub fn new(sink: Arc<dyn SpeedSink>) -> Self {
        Self {
            sink,
            interval: DEFAULT_SPEED_INTERVAL,
        }
    }

    /// Overrides the sampling interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Emits smoothed throughput: bytes since the last sample over time since the last sample.
#[derive(Debug)]
pub struct SpeedSampler {
    telemetry: Option<SpeedTelemetry>,
    last_sample: Instant,
    pending_bytes: u64,
}

impl SpeedSampler {
    /// Creates a sampler; without telemetry every call is a no-op.
    #[must_use]
    pub fn new(telemetry: Option<SpeedTelemetry>, now: Instant) -> Self {
        Self {
            telemetry,
            last_sample: now,
            pending_bytes: 0,
        }
    }

    /// Transfer start: emits the zero bookend and resets the window.
    pub fn begin(&mut self, now: Instant) {
        self.emit(0.0);
        self.last_sample = now;
        self.pending_bytes = 0;
    }

    /// Accounts a chunk and emits a sample once the interval has passed.
    pub fn on_chunk(&mut self, len: usize, now: Instant) {
        self.pending_bytes += len as u64;
        let Some(interval) = self.telemetry.as_ref().map(|t| t.interval) else {
            return;
        };
        let since = now.saturating_duration_since(self.last_sample);
        if since >= interval {
            self.flush(since, now);
        }
    }

    /// Transfer end: emits the tail sample (if over a second of data is
    /// pending) and the zero bookend.
    pub fn end(&mut self, now: Instant) {
        let since = now.saturating_duration_since(self.last_sample);
        if self.pending_bytes > 0 && since > Duration::from_secs(1) {
            self.flush(since, now);
        }
        self.emit(0.0);
    }

    fn flush(&mut self, since: Duration, now: Instant) {
        let micros = u64::try_from(since.as_micros()).unwrap_or(u64::MAX);
        self.emit(throughput(self.pending_bytes, micros));
        self.pending_bytes = 0;
        self.last_sample = now;
    }

    fn emit(&self, bytes_per_sec: f64) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.sink.record(bytes_per_sec);
        }
    }
}

/// Appends `<timestamp> <speed> KB/s` lines to a file.
///
/// Writes are blocking `std::fs` appends of one short line behind a mutex,
/// done on the worker's task. The sampler's interval (1 s minimum from the
/// CLI and config) keeps them to a handful per transfer.
#[derive(Debug)]
pub struct SpeedReportFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl SpeedReportFile {
    /// Opens (or creates) the report file in append mode.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the report file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SpeedSink for SpeedReportFile {
    fn record(&self, bytes_per_sec: f64) {
        let line = format_speed_line(&timestamp(), bytes_per_sec);
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = file.write_all(line.as_bytes()) {
            debug!(path = %self.path.display(), %error, "speed report write failed");
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_speed_line(stamp: &str, bytes_per_sec: f64) -> String {
    format!("{stamp} {:.3} KB/s\n", bytes_per_sec / 1000.0)
}
