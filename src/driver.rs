//! Queue-to-engine driver loop and the outcome report log.
//!
//! The driver owns both sides: it merges staged links, hands the front link
//! to the engine, polls the engine until the request settles and then writes
//! one `<OUTCOME> <url>` line per link to the report log.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::download::{DownloadEngine, DownloadState, DownloadStatus, EngineError};
use crate::queue::{QueueError, WorkQueue};

/// Default polling interval (4 Hz).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors that stop the driver loop.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The queue files could not be read or committed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The engine refused a request for a reason other than a bad link.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The report log could not be written.
    #[error("cannot write report log {path}: {source}")]
    Report {
        /// The report log.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The engine published a status no request can be in.
    #[error("engine reported unexpected status {status:?} (code {code})", code = .status.code())]
    UnexpectedStatus {
        /// The status observed.
        status: DownloadStatus,
    },
}

/// Per-link outcome written to the report log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// File downloaded.
    Ok,
    /// Attempt budget exhausted.
    Cancel,
    /// The site says the file is gone.
    NotFound,
    /// Not a file link.
    Invalid,
}

impl ReportOutcome {
    /// Outcome for a terminal engine status.
    #[must_use]
    pub fn from_status(status: DownloadStatus) -> Option<Self> {
        match status {
            DownloadStatus::Downloaded => Some(Self::Ok),
            DownloadStatus::Canceled => Some(Self::Cancel),
            DownloadStatus::NotFound => Some(Self::NotFound),
            _ => None,
        }
    }

    /// Label written to the report log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancel => "CANCEL",
            Self::NotFound => "NOTFOUND",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only `<OUTCOME> <url>` log.
#[derive(Debug, Clone)]
pub struct ReportLog {
    path: PathBuf,
}

impl ReportLog {
    /// Report log at `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one outcome line.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Report`] if the file cannot be opened or written.
    pub async fn append(&self, outcome: ReportOutcome, url: &str) -> Result<(), DriverError> {
        let line = format!("{outcome} {url}\n");
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| self.report_error(source))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| self.report_error(source))?;
        file.flush().await.map_err(|source| self.report_error(source))
    }

    fn report_error(&self, source: std::io::Error) -> DriverError {
        DriverError::Report {
            path: self.path.clone(),
            source,
        }
    }
}

/// Receives driver events, typically to render them.
pub trait ProgressObserver: Send {
    /// A link was handed to the engine.
    fn on_start(&mut self, url: &str);
    /// A snapshot taken while the request is in flight.
    fn on_progress(&mut self, snapshot: &DownloadState);
    /// The request settled with `outcome`; `snapshot` is its final state.
    fn on_finish(&mut self, outcome: ReportOutcome, snapshot: &DownloadState);
    /// The link was rejected as not a file link.
    fn on_invalid(&mut self, url: &str);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl ProgressObserver for SilentObserver {
    fn on_start(&mut self, _url: &str) {}
    fn on_progress(&mut self, _snapshot: &DownloadState) {}
    fn on_finish(&mut self, _outcome: ReportOutcome, _snapshot: &DownloadState) {}
    fn on_invalid(&mut self, _url: &str) {}
}

/// Per-outcome counts of one driver run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Links downloaded.
    pub ok: usize,
    /// Links that ran out of attempts.
    pub canceled: usize,
    /// Links the site reports as gone.
    pub not_found: usize,
    /// Links rejected as malformed.
    pub invalid: usize,
}

impl RunSummary {
    /// Total links processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.ok + self.canceled + self.not_found + self.invalid
    }

    fn record(&mut self, outcome: ReportOutcome) {
        match outcome {
            ReportOutcome::Ok => self.ok += 1,
            ReportOutcome::Cancel => self.canceled += 1,
            ReportOutcome::NotFound => self.not_found += 1,
            ReportOutcome::Invalid => self.invalid += 1,
        }
    }
}

/// Drains a [`WorkQueue`] through a [`DownloadEngine`].
#[derive(Debug)]
pub struct Driver {
    engine: DownloadEngine,
    queue: WorkQueue,
    report: ReportLog,
    poll_interval: Duration,
}

impl Driver {
    /// Creates a driver polling at [`DEFAULT_POLL_INTERVAL`].
    #[must_use]
    pub fn new(engine: DownloadEngine, queue: WorkQueue, report: ReportLog) -> Self {
        Self {
            engine,
            queue,
            report,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The queue being drained.
    #[must_use]
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Processes links until the queue is empty.
    ///
    /// # Errors
    ///
    /// Any [`DriverError`]; all of them are fatal. A single link's failure
    /// is an outcome, not an error.
    #[instrument(skip(self, observer), fields(report = %self.report.path().display()))]
    pub async fn run(
        &mut self,
        observer: &mut dyn ProgressObserver,
    ) -> Result<RunSummary, DriverError> {
        let mut summary = RunSummary::default();

        loop {
            self.queue.refresh().await?;
            let Some(entry) = self.queue.front() else {
                break;
            };
            let url = entry.url.clone();

            let outcome = match self.engine.download(&url) {
                Ok(()) => {
                    observer.on_start(&url);
                    let (outcome, last) = self.settle(observer).await?;
                    observer.on_finish(outcome, &last);
                    outcome
                }
                Err(EngineError::InvalidRequest { .. }) => {
                    observer.on_invalid(&url);
                    ReportOutcome::Invalid
                }
                Err(error) => return Err(error.into()),
            };

            self.report.append(outcome, &url).await?;
            self.queue.pop_front().await?;
            summary.record(outcome);
            info!(%outcome, url, "link processed");
        }

        info!(
            ok = summary.ok,
            canceled = summary.canceled,
            not_found = summary.not_found,
            invalid = summary.invalid,
            "queue drained"
        );
        Ok(summary)
    }

    /// Polls the engine until the active request reaches a terminal status.
    async fn settle(
        &self,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(ReportOutcome, DownloadState), DriverError> {
        loop {
            let snapshot = self.engine.progress();
            if let Some(outcome) = ReportOutcome::from_status(snapshot.status) {
                return Ok((outcome, snapshot));
            }
            if matches!(
                snapshot.status,
                DownloadStatus::None | DownloadStatus::Unknown
            ) {
                warn!(status = ?snapshot.status, "engine state out of range");
                return Err(DriverError::UnexpectedStatus {
                    status: snapshot.status,
                });
            }
            if !self.engine.is_running() {
                warn!(url = %snapshot.url, "download worker died mid-request");
                return Err(EngineError::WorkerStopped.into());
            }
            observer.on_progress(&snapshot);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
