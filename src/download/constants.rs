//! Constants for the download module (timeouts, backoff waits, attempt budget).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds, the site answers quickly or not at all).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout: longest silence tolerated between two reads.
pub const READ_TIMEOUT_SECS: u64 = 6 * 60 * 60;

/// Number of full stage 1-3 passes allowed per request before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Wait after a "try again later" page.
pub const WAIT_FOR_LATER: Duration = Duration::from_secs(60);

/// Wait after a "download limit reached" page.
pub const WAIT_FOR_LIMIT: Duration = Duration::from_secs(120);

/// Wait after a "servers busy" page.
pub const WAIT_FOR_BUSY: Duration = Duration::from_secs(120);

/// Wait after an "already downloading" page.
pub const WAIT_FOR_RIVALRY: Duration = Duration::from_secs(60);

/// Countdown used when the ticket page carries no `var c=N;` value.
pub const DEFAULT_COUNTDOWN: Duration = Duration::from_secs(5);

/// Safety margin added on top of the site's countdown.
pub const COUNTDOWN_MARGIN: Duration = Duration::from_secs(5);

/// Longest countdown taken from a ticket page; larger values are capped.
pub const MAX_COUNTDOWN: Duration = Duration::from_secs(60 * 60);

/// Upper bound on any single wait, whatever the policy says.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Granularity of the live `wait_remaining` countdown.
pub const WAIT_TICK: Duration = Duration::from_secs(1);

/// Default interval between smoothed speed samples.
pub const DEFAULT_SPEED_INTERVAL: Duration = Duration::from_secs(10);

/// Form body posted to the stage-1 action URL to request the free ticket.
pub const TICKET_FORM: &str = "dl.start=Free";

/// Form body posted to the selected mirror to start the transfer.
pub const MIRROR_FORM: &str = "mirror=";
