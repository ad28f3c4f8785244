//! Binary-side wiring: configuration, logging and terminal output.

pub mod config;
pub mod logging;
pub mod terminal;

use std::sync::Arc;

use anyhow::{Context, Result};
use fetchbot_core::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use fetchbot_core::download::{
    DownloadEngine, EngineConfig, HttpClient, SpeedReportFile, SpeedTelemetry,
};
use fetchbot_core::driver::{Driver, ProgressObserver, ReportLog, RunSummary, SilentObserver};
use fetchbot_core::queue::{QueuePaths, WorkQueue};
use tracing::{debug, info};

use config::Settings;
use terminal::TerminalObserver;

/// Opens the queue, starts the engine and drains the queue.
pub async fn run(settings: &Settings, quiet: bool) -> Result<RunSummary> {
    let queue = WorkQueue::open(QueuePaths::in_dir(&settings.queue_dir))
        .await
        .context("Failed to open the work queue")?;
    info!(pending = queue.len(), "queue loaded");

    let client = HttpClient::with_timeouts(
        settings
            .connect_timeout
            .map_or(CONNECT_TIMEOUT_SECS, |timeout| timeout.as_secs()),
        settings
            .read_timeout
            .map_or(READ_TIMEOUT_SECS, |timeout| timeout.as_secs()),
    )
    .context("Failed to build HTTP client")?;

    let mut engine_config = EngineConfig::new(&settings.download_dir, &settings.sessions_dir);
    if let Some(cookie) = &settings.cookie {
        engine_config = engine_config.with_cookie(cookie.clone());
    }
    if let Some(path) = &settings.speed_report {
        let report = SpeedReportFile::open(path)
            .with_context(|| format!("Failed to open speed report '{}'", path.display()))?;
        let mut telemetry = SpeedTelemetry::new(Arc::new(report));
        if let Some(interval) = settings.speed_interval {
            telemetry = telemetry.with_interval(interval);
        }
        debug!(
            path = %path.display(),
            interval_secs = telemetry.interval.as_secs(),
            "speed report enabled"
        );
        engine_config = engine_config.with_telemetry(telemetry);
    }

    let engine = DownloadEngine::start(engine_config, Arc::new(client))
        .await
        .context("Failed to start the download engine")?;

    let mut driver = Driver::new(engine, queue, ReportLog::new(&settings.report_log));
    let mut terminal = TerminalObserver::default();
    let mut silent = SilentObserver;
    let observer: &mut dyn ProgressObserver = if quiet { &mut silent } else { &mut terminal };

    driver.run(observer).await.context("Driver loop failed")
}
