//! Download engine for the free file-hosting site.
//!
//! The site hides the real file behind two HTML pages, a countdown and a
//! handful of "not now" answers. This module drives that flow:
//!
//! - [`classifier`] reads page text and extracts the values each stage needs
//! - [`ServerSelector`] picks a mirror by provider preference
//! - [`DownloadEngine`] runs the single background worker and publishes a
//!   [`DownloadState`] snapshot for pollers
//! - [`SpeedSampler`] and [`SpeedReportFile`] record throughput samples
//!
//! Network access goes through the [`Transport`] trait; [`HttpClient`] is the
//! `reqwest` implementation.

pub mod classifier;
mod client;
pub mod constants;
mod engine;
mod error;
mod mirror;
mod request;
mod retry;
mod status;
mod telemetry;
mod transport;

pub use classifier::{BackoffSignal, Mirror, Unavailable};
pub use client::{BROWSER_USER_AGENT, HttpClient};
pub use engine::{DownloadEngine, EngineConfig, EngineError};
pub use error::DownloadError;
pub use mirror::{DEFAULT_PREFERENCE, ServerSelector};
pub use request::DownloadRequest;
pub use retry::{AbandonReason, BackoffPolicy, StageBreak};
pub use status::{DownloadState, DownloadStatus};
pub use telemetry::{
    ChunkSample, SpeedReportFile, SpeedSampler, SpeedSink, SpeedTelemetry, TransferMeter, eta,
    throughput,
};
pub use transport::{ChunkCallback, FetchRequest, FileResponse, PageResponse, Transport};

// Note: no module-local Result aliases. Use `Result<T, DownloadError>` explicitly.
