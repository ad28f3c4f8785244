//! The background worker: attempt loop and the three stage functions.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use super::EngineConfig;
use super::artifacts::{
    LANDING_BODY, LANDING_HEAD, SessionArtifacts, TICKET_BODY, TICKET_HEAD, TRANSFER_HEAD,
};
use crate::download::classifier;
use crate::download::constants::{MAX_WAIT, MIRROR_FORM, TICKET_FORM, WAIT_TICK};
use crate::download::request::DownloadRequest;
use crate::download::retry::{AbandonReason, StageBreak};
use crate::download::status::{DownloadState, DownloadStatus};
use crate::download::telemetry::{SpeedSampler, TransferMeter, throughput};
use crate::download::transport::{FetchRequest, Transport};

/// Totals of a finished stage-3 transfer.
#[derive(Debug, Clone, Copy)]
struct TransferTotals {
    bytes: u64,
    elapsed_micros: u64,
}

pub(super) struct Worker {
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    state: Arc<watch::Sender<DownloadState>>,
    artifacts: SessionArtifacts,
}

impl Worker {
    pub(super) fn new(
        transport: Arc<dyn Transport>,
        config: EngineConfig,
        state: Arc<watch::Sender<DownloadState>>,
    ) -> Self {
        let artifacts = SessionArtifacts::new(&config.sessions_dir);
        Self {
            transport,
            config,
            state,
            artifacts,
        }
    }

    /// Serves requests until every sender is gone.
    pub(super) async fn run(self, mut requests: mpsc::Receiver<DownloadRequest>) {
        while let Some(request) = requests.recv().await {
            let outcome = self.execute(&request).await;
            self.state.send_modify(|state| {
                state.status = outcome;
                state.wait_remaining = 0;
            });
        }
        debug!("request channel closed, worker exiting");
    }

    #[instrument(skip(self, request), fields(url = request.url()))]
    async fn execute(&self, request: &DownloadRequest) -> DownloadStatus {
        let max_attempts = self.config.max_attempts;
        let mut failures = 0;

        while failures < max_attempts {
            self.set_status(DownloadStatus::Preparing);
            match self.attempt(request).await {
                Ok(totals) => {
                    let secs = Duration::from_micros(totals.elapsed_micros).as_secs_f64();
                    let kb_per_sec = throughput(totals.bytes, totals.elapsed_micros) / 1000.0;
                    info!(
                        bytes = totals.bytes,
                        secs = format!("{secs:.1}"),
                        kb_per_sec = format!("{kb_per_sec:.3}"),
                        "download finished"
                    );
                    return DownloadStatus::Downloaded;
                }
                Err(StageBreak::Backoff(signal)) => {
                    let (status, wait) = self.config.backoff.wait_for(signal);
                    warn!(
                        signal = signal.as_str(),
                        wait_secs = wait.as_secs(),
                        "site asked to back off"
                    );
                    self.wait(status, wait).await;
                }
                Err(StageBreak::Abandon(reason)) => {
                    failures += 1;
                    warn!(attempt = failures, max_attempts, %reason, "attempt abandoned");
                }
                Err(StageBreak::NotFound(why)) => {
                    info!(reason = ?why, "file not available");
                    return DownloadStatus::NotFound;
                }
            }
        }

        info!(max_attempts, "attempt budget exhausted, canceling");
        DownloadStatus::Canceled
    }

    async fn attempt(&self, request: &DownloadRequest) -> Result<TransferTotals, StageBreak> {
        let ticket_url = self.landing(request).await?;
        let mirror_url = self.ticket(request, &ticket_url).await?;
        self.transfer(request, &mirror_url).await
    }

    /// Stage 1: the landing page links to the ticket form.
    async fn landing(&self, request: &DownloadRequest) -> Result<String, StageBreak> {
        debug!("stage 1: fetching landing page");
        let fetch = FetchRequest::get(request.url()).with_cookie(self.config.cookie.as_deref());
        let page = self
            .transport
            .fetch_page(&fetch)
            .await
            .map_err(|source| AbandonReason::transport(1, source))?;

        let name = request.file_name();
        self.artifacts.save_body(name, LANDING_BODY, &page.body).await;
        self.artifacts
            .save_head(name, LANDING_HEAD, page.status, &page.headers)
            .await;

        if !page.is_ok() {
            return Err(AbandonReason::bad_status(1, page.status).into());
        }
        if let Some(why) = classifier::unavailable(&page.body) {
            return Err(StageBreak::NotFound(why));
        }
        let next = classifier::next_stage_url(&page.body)
            .ok_or(StageBreak::Abandon(AbandonReason::MissingNextStage))?;
        debug!(next = %next, "stage 1: ticket form found");
        Ok(next)
    }

    /// Stage 2: the ticket page carries size, countdown and the mirror list.
    async fn ticket(&self, request: &DownloadRequest, url: &str) -> Result<String, StageBreak> {
        debug!(url, "stage 2: requesting free ticket");
        let fetch = FetchRequest::get(url)
            .with_form(TICKET_FORM)
            .with_cookie(self.config.cookie.as_deref());
        let page = self
            .transport
            .fetch_page(&fetch)
            .await
            .map_err(|source| AbandonReason::transport(2, source))?;

        let name = request.file_name();
        self.artifacts.save_body(name, TICKET_BODY, &page.body).await;
        self.artifacts
            .save_head(name, TICKET_HEAD, page.status, &page.headers)
            .await;

        if !page.is_ok() {
            return Err(AbandonReason::bad_status(2, page.status).into());
        }
        if let Some(signal) = classifier::backoff_signal(&page.body) {
            return Err(StageBreak::Backoff(signal));
        }

        let total_size =
            classifier::file_size(&page.body).ok_or(AbandonReason::MissingFileSize)?;
        let countdown = self
            .config
            .backoff
            .countdown(classifier::countdown_secs(&page.body));
        let mirrors = classifier::mirrors(&page.body);
        let mirror = self
            .config
            .selector
            .select(&mirrors)
            .ok_or(AbandonReason::NoServers)?;
        info!(
            server = %mirror.name,
            candidates = mirrors.len(),
            total_size,
            countdown_secs = countdown.as_secs(),
            "stage 2: mirror selected"
        );
        let mirror_url = mirror.url.clone();

        self.state.send_modify(|state| state.total_size = total_size);
        self.wait(DownloadStatus::Waiting, countdown).await;
        Ok(mirror_url)
    }

    /// Stage 3: stream the file from the chosen mirror.
    async fn transfer(
        &self,
        request: &DownloadRequest,
        url: &str,
    ) -> Result<TransferTotals, StageBreak> {
        let path = self.config.download_dir.join(request.file_name());
        debug!(url, path = %path.display(), "stage 3: streaming file");

        self.state.send_modify(|state| {
            state.status = DownloadStatus::Downloading;
            state.reset_transfer();
        });

        let start = Instant::now();
        let mut sampler = SpeedSampler::new(self.config.telemetry.clone(), start);
        let mut meter = TransferMeter::start(start);
        sampler.begin(start);

        let shared = &self.state;
        let mut on_chunk = |len: usize| {
            let now = Instant::now();
            let sample = meter.record(len, now);
            sampler.on_chunk(len, now);
            shared.send_modify(|state| {
                state.bytes_transferred += sample.bytes;
                state.elapsed_micros += sample.elapsed_micros;
                state.instantaneous_speed = sample.speed;
            });
            ControlFlow::Continue(())
        };

        let fetch = FetchRequest::get(url)
            .with_form(MIRROR_FORM)
            .with_cookie(self.config.cookie.as_deref());
        let result = self
            .transport
            .fetch_to_file(&fetch, &path, &mut on_chunk)
            .await;
        sampler.end(Instant::now());

        let response = result.map_err(|source| AbandonReason::transport(3, source))?;
        self.artifacts
            .save_head(
                request.file_name(),
                TRANSFER_HEAD,
                response.status,
                &response.headers,
            )
            .await;
        if !response.is_ok() {
            return Err(AbandonReason::bad_status(3, response.status).into());
        }

        let snapshot = self.state.borrow();
        Ok(TransferTotals {
            bytes: snapshot.bytes_transferred,
            elapsed_micros: snapshot.elapsed_micros,
        })
    }

    /// Sits out `duration` under `status`, publishing the seconds left each tick.
    ///
    /// Waits longer than [`MAX_WAIT`] are cut to it.
    async fn wait(&self, status: DownloadStatus, duration: Duration) {
        if duration > MAX_WAIT {
            warn!(requested_secs = duration.as_secs(), "wait capped");
        }
        let deadline = tokio::time::Instant::now() + duration.min(MAX_WAIT);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            self.state.send_modify(|state| {
                state.status = status;
                state.wait_remaining = ceil_secs(remaining);
            });
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(remaining.min(WAIT_TICK)).await;
        }
        self.state.send_modify(|state| {
            state.status = DownloadStatus::Preparing;
            state.wait_remaining = 0;
        });
    }

    fn set_status(&self, status: DownloadStatus) {
        self.state.send_modify(|state| state.status = status);
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
