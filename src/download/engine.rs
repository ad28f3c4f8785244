//! Download engine: one background worker, one active request at a time.
//!
//! The site allows a single concurrent download per address, so the engine
//! enforces a strict single-flight rule. The caller hands a link to
//! [`DownloadEngine::download`], which validates it, flips the shared state
//! to `Preparing` and passes the request to the worker through a one-slot
//! channel. The worker then runs the three-stage protocol on its own while
//! the caller polls [`DownloadEngine::progress`] until a terminal status
//! shows up.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use fetchbot_core::download::{DownloadEngine, EngineConfig, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new("./d", "./s");
//! let engine = DownloadEngine::start(config, Arc::new(HttpClient::new()?)).await?;
//! engine.download("http://host.example/files/123/archive.zip")?;
//! loop {
//!     let snapshot = engine.progress();
//!     if snapshot.status.is_terminal() {
//!         println!("{}: {}", snapshot.url, snapshot.status);
//!         break;
//!     }
//!     tokio::time::sleep(Duration::from_millis(250)).await;
//! }
//! # Ok(())
//! # }
//! ```

mod artifacts;
mod worker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::constants::DEFAULT_MAX_ATTEMPTS;
use super::mirror::ServerSelector;
use super::request::DownloadRequest;
use super::retry::BackoffPolicy;
use super::status::{DownloadState, DownloadStatus};
use super::telemetry::SpeedTelemetry;
use super::transport::Transport;
use worker::Worker;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A required directory was not configured.
    #[error("no {which} directory configured")]
    MissingDirectory {
        /// Which directory (`download` or `sessions`).
        which: &'static str,
    },

    /// A configured directory could not be created.
    #[error("cannot prepare directory {path}: {source}")]
    Directory {
        /// The directory path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The link is not a canonical file link.
    #[error("invalid request: {url}")]
    InvalidRequest {
        /// The rejected link.
        url: String,
    },

    /// A request is already in flight.
    #[error("download already in progress: {active}")]
    AlreadyInProgress {
        /// Link of the request currently in flight.
        active: String,
    },

    /// The worker task is gone.
    #[error("download worker stopped")]
    WorkerStopped,
}

/// Engine settings, validated once by [`DownloadEngine::start`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where finished files go.
    pub download_dir: PathBuf,
    /// Where raw pages and headers of each stage go.
    pub sessions_dir: PathBuf,
    /// Attempts per request before giving up.
    pub max_attempts: u32,
    /// Waits for backoff signals and countdowns.
    pub backoff: BackoffPolicy,
    /// Mirror preference.
    pub selector: ServerSelector,
    /// Optional speed samples.
    pub telemetry: Option<SpeedTelemetry>,
    /// Optional `Cookie` header sent with every stage.
    pub cookie: Option<String>,
}

impl EngineConfig {
    /// Default settings with the given directories.
    pub fn new(download_dir: impl Into<PathBuf>, sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            sessions_dir: sessions_dir.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffPolicy::default(),
            selector: ServerSelector::default(),
            telemetry: None,
            cookie: None,
        }
    }

    /// Overrides the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overrides the attempt budget (at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Overrides the mirror preference.
    #[must_use]
    pub fn with_selector(mut self, selector: ServerSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Enables speed telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: SpeedTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sends a cookie header with every request.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.download_dir.as_os_str().is_empty() {
            return Err(EngineError::MissingDirectory { which: "download" });
        }
        if self.sessions_dir.as_os_str().is_empty() {
            return Err(EngineError::MissingDirectory { which: "sessions" });
        }
        Ok(())
    }
}

/// Handle to the download worker.
///
/// Owns the worker task; dropping the handle aborts it mid-flight. Partial
/// files are not resumed, so an abort only costs the current transfer.
#[derive(Debug)]
pub struct DownloadEngine {
    state: Arc<watch::Sender<DownloadState>>,
    requests: mpsc::Sender<DownloadRequest>,
    worker: JoinHandle<()>,
}

impl DownloadEngine {
    /// Validates the configuration, creates the directories and spawns the worker.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingDirectory`] for an empty directory path
    /// and [`EngineError::Directory`] if a directory cannot be created.
    #[instrument(level = "debug", skip(config, transport), fields(
        download_dir = %config.download_dir.display(),
        sessions_dir = %config.sessions_dir.display(),
    ))]
    pub async fn start(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        prepare_dir(&config.download_dir).await?;
        prepare_dir(&config.sessions_dir).await?;

        debug!(
            max_attempts = config.max_attempts,
            telemetry = config.telemetry.is_some(),
            "starting download worker"
        );

        let (state, _) = watch::channel(DownloadState::default());
        let state = Arc::new(state);
        let (requests, receiver) = mpsc::channel(1);
        let worker = Worker::new(transport, config, Arc::clone(&state));
        let worker = tokio::spawn(worker.run(receiver));

        Ok(Self {
            state,
            requests,
            worker,
        })
    }

    /// Requests a download of `url`. Returns as soon as the worker has the request.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidRequest`] if `url` is not a canonical file link
    ///   (permanent; do not resubmit).
    /// - [`EngineError::AlreadyInProgress`] if a request is in flight.
    /// - [`EngineError::WorkerStopped`] if the worker is gone.
    #[instrument(level = "debug", skip(self))]
    pub fn download(&self, url: &str) -> Result<(), EngineError> {
        let Some(request) = DownloadRequest::parse(url) else {
            warn!(url, "rejecting invalid link");
            return Err(EngineError::InvalidRequest {
                url: url.to_string(),
            });
        };
        if !self.is_running() {
            return Err(EngineError::WorkerStopped);
        }

        let mut active = None;
        let accepted = self.state.send_if_modified(|state| {
            if state.status.is_idle() {
                state.begin(request.url());
                true
            } else {
                active = Some(state.url.clone());
                false
            }
        });
        if !accepted {
            return Err(EngineError::AlreadyInProgress {
                active: active.unwrap_or_default(),
            });
        }

        // The slot is free: the worker drains it before leaving the idle states.
        if let Err(error) = self.requests.try_send(request) {
            warn!(%error, "handoff to worker failed");
            self.state.send_modify(|state| state.status = DownloadStatus::Canceled);
            return Err(EngineError::WorkerStopped);
        }

        info!(url, "download requested");
        Ok(())
    }

    /// Consistent snapshot of the shared state.
    #[must_use]
    pub fn progress(&self) -> DownloadState {
        self.state.borrow().clone()
    }

    /// Whether the worker task is still alive.
    ///
    /// A worker that panicked leaves the shared state wherever it stopped;
    /// callers polling for a terminal status must check this as well.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state.subscribe()
    }
}

impl Drop for DownloadEngine {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn prepare_dir(path: &Path) -> Result<(), EngineError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| EngineError::Directory {
            path: path.to_path_buf(),
            source,
        })
}
