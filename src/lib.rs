//! Fetchbot Core Library
//!
//! Automates downloads from a free file-hosting site that hides each file
//! behind two HTML pages, a countdown and a set of "not now" answers.
//!
//! # Architecture
//!
//! - [`download`] - page classifier, mirror selection, the single-flight
//!   download engine and transfer telemetry
//! - [`queue`] - crash-safe on-disk queue of pending links
//! - [`driver`] - loop that drains the queue through the engine and writes
//!   the outcome report

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod driver;
pub mod queue;

// Re-export commonly used types
pub use download::{
    BackoffPolicy, DownloadEngine, DownloadError, DownloadState, DownloadStatus, EngineConfig,
    EngineError, HttpClient, ServerSelector, SpeedReportFile, SpeedTelemetry, Transport,
};
pub use driver::{Driver, DriverError, ProgressObserver, ReportLog, ReportOutcome, RunSummary};
pub use queue::{QueueError, QueuePaths, WorkQueue};
