//! Attempt outcomes and the backoff policy for the site's "not now" answers.
//!
//! Each stage of the protocol returns `Result<T, StageBreak>`. The attempt
//! loop inspects the break and decides:
//!
//! - [`StageBreak::Backoff`] - wait the policy's duration for that signal and
//!   rerun the attempt; the attempt budget is NOT charged.
//! - [`StageBreak::Abandon`] - give up on this attempt; one budget slot is spent.
//! - [`StageBreak::NotFound`] - the file is gone; stop the whole request.

use std::time::Duration;

use thiserror::Error;

use super::DownloadError;
use super::classifier::{BackoffSignal, Unavailable};
use super::constants::{
    COUNTDOWN_MARGIN, DEFAULT_COUNTDOWN, MAX_COUNTDOWN, WAIT_FOR_BUSY, WAIT_FOR_LATER, WAIT_FOR_LIMIT,
    WAIT_FOR_RIVALRY,
};
use super::status::DownloadStatus;

/// Why a stage stopped short of handing a value to the next stage.
#[derive(Debug, Error)]
pub enum StageBreak {
    /// The site said "not now"; wait and retry without spending budget.
    #[error("site asked to back off ({})", .0.as_str())]
    Backoff(BackoffSignal),

    /// This attempt failed; the next one may succeed.
    #[error("attempt abandoned: {0}")]
    Abandon(#[from] AbandonReason),

    /// The site reports the file as gone; no attempt can succeed.
    #[error("file unavailable: {0:?}")]
    NotFound(Unavailable),
}

/// Reasons an attempt is abandoned (each costs one budget slot).
#[derive(Debug, Error)]
pub enum AbandonReason {
    /// No response at all.
    #[error("stage {stage} transport failure: {source}")]
    Transport {
        /// Stage number (1-3).
        stage: u8,
        /// Underlying transport error.
        #[source]
        source: DownloadError,
    },

    /// A response other than 200 OK.
    #[error("stage {stage} returned HTTP {status}")]
    BadStatus {
        /// Stage number (1-3).
        stage: u8,
        /// Status code received.
        status: u16,
    },

    /// The landing page carries no form pointing at stage 2.
    #[error("landing page has no next-stage link")]
    MissingNextStage,

    /// The ticket page carries no size label (layout change or tiny file alike).
    #[error("ticket page has no file size")]
    MissingFileSize,

    /// The ticket page offers no mirrors.
    #[error("ticket page offers no servers")]
    NoServers,
}

impl AbandonReason {
    /// Transport failure in `stage`.
    #[must_use]
    pub fn transport(stage: u8, source: DownloadError) -> Self {
        Self::Transport { stage, source }
    }

    /// Non-200 status in `stage`.
    #[must_use]
    pub fn bad_status(stage: u8, status: u16) -> Self {
        Self::BadStatus { stage, status }
    }
}

/// How long to sit out each kind of wait.
///
/// The defaults are the site's observed cool-down periods; tests shrink them
/// to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// "Try again later".
    pub later: Duration,
    /// Download limit reached.
    pub limit: Duration,
    /// Servers busy.
    pub busy: Duration,
    /// Another download from this address.
    pub rivalry: Duration,
    /// Countdown used when the page does not state one.
    pub default_countdown: Duration,
    /// Extra time added to every countdown.
    pub countdown_margin: Duration,
    /// Cap on the countdown read from the page.
    pub max_countdown: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            later: WAIT_FOR_LATER,
            limit: WAIT_FOR_LIMIT,
            busy: WAIT_FOR_BUSY,
            rivalry: WAIT_FOR_RIVALRY,
            default_countdown: DEFAULT_COUNTDOWN,
            countdown_margin: COUNTDOWN_MARGIN,
            max_countdown: MAX_COUNTDOWN,
        }
    }
}

impl BackoffPolicy {
    /// A policy with no waits at all.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            later: Duration::ZERO,
            limit: Duration::ZERO,
            busy: Duration::ZERO,
            rivalry: Duration::ZERO,
            default_countdown: Duration::ZERO,
            countdown_margin: Duration::ZERO,
            max_countdown: Duration::ZERO,
        }
    }

    /// Status shown and duration slept for a backoff signal.
    #[must_use]
    pub fn wait_for(&self, signal: BackoffSignal) -> (DownloadStatus, Duration) {
        match signal {
            BackoffSignal::TryLater => (DownloadStatus::Later, self.later),
            BackoffSignal::LimitReached => (DownloadStatus::Limit, self.limit),
            BackoffSignal::ServersBusy => (DownloadStatus::Busy, self.busy),
            BackoffSignal::AlreadyDownloading => (DownloadStatus::Rivalry, self.rivalry),
        }
    }

    /// Countdown before the mirror link becomes valid.
    ///
    /// The page value is capped at `max_countdown` before the margin is added.
    #[must_use]
    pub fn countdown(&self, page_secs: Option<u64>) -> Duration {
        page_secs
            .map_or(self.default_countdown, Duration::from_secs)
            .min(self.max_countdown)
            .saturating_add(self.countdown_margin)
    }
}
