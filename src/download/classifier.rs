//! Page classifier: recognises the site's signal phrases and pulls structured
//! values (next-stage URL, file size, countdown, mirror list) out of its HTML.
//!
//! Everything here is a pure function over page text. The markup belongs to
//! a third party and changes without notice, so all patterns live in this
//! module and the engine only sees the typed results.

use std::sync::LazyLock;

use regex::Regex;

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static FILE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"^https?://[A-Za-z0-9.\-]+(?::[0-9]+)?/files/[0-9]+/[A-Za-z0-9._\-]+$")
});

static NEXT_STAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"<form id="ff" action="(https?://[A-Za-z0-9._/:\-]*)" method="post">"#)
});

static FILE_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"<p class="downloadlink">\S+ <font style="[A-Za-z0-9._;:,#\- ]*">\| ([0-9]+) KB</font></p>"#,
    )
});

static COUNTDOWN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"var c=([0-9]+);"));

static MIRROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"onclick="document\.dlf\.action=\\'(https?://[A-Za-z0-9._/:\-]*)\\';" /> ([A-Za-z0-9._\-#() ]*)<br />"#,
    )
});

const DELETED: &str = "This file has been deleted";
const ILLEGAL: &str =
    "This file is suspected to contain illegal content and has been blocked.";
const NOT_FOUND: &str = "The file could not be found.";
const TRY_LATER: &str = "Or try again in about ";
const LIMIT_REACHED: &str = "You have reached the download limit for free-users";
const SERVERS_BUSY: &str = "Currently a lot of users are downloading files";
const ALREADY_DOWNLOADING: &str = "is already downloading a file.";

/// The site's size label is in kilobytes of 1000 bytes.
const BYTES_PER_KB: u64 = 1000;

/// Why the landing page says the file is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// "This file has been deleted".
    Deleted,
    /// Blocked for suspected illegal content.
    Illegal,
    /// "The file could not be found."
    NotFound,
}

/// A "not now" answer on the ticket page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffSignal {
    /// "Or try again in about N minutes".
    TryLater,
    /// Free-user download limit reached for this IP.
    LimitReached,
    /// All free slots taken.
    ServersBusy,
    /// Another download is already running from this IP.
    AlreadyDownloading,
}

impl BackoffSignal {
    /// Short label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TryLater => "try_later",
            Self::LimitReached => "limit_reached",
            Self::ServersBusy => "servers_busy",
            Self::AlreadyDownloading => "already_downloading",
        }
    }
}

/// A download host offered on the ticket page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    /// Provider label as displayed, e.g. `Cogent #2`.
    pub name: String,
    /// Form action URL for this host.
    pub url: String,
}

impl Mirror {
    /// Builds a mirror candidate.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Returns true if `url` has the canonical `<scheme>://<host>/files/<id>/<name>` shape.
#[must_use]
pub fn is_file_link(url: &str) -> bool {
    FILE_LINK_RE.is_match(url)
}

/// Detects the permanent "file is gone" messages on the landing page.
#[must_use]
pub fn unavailable(page: &str) -> Option<Unavailable> {
    if page.contains(ILLEGAL) {
        Some(Unavailable::Illegal)
    } else if page.contains(DELETED) {
        Some(Unavailable::Deleted)
    } else if page.contains(NOT_FOUND) {
        Some(Unavailable::NotFound)
    } else {
        None
    }
}

/// Detects a backoff signal on the ticket page.
///
/// Checked in a fixed order (later, limit, busy, rivalry) so a page carrying
/// several phrases always maps to the same signal.
#[must_use]
pub fn backoff_signal(page: &str) -> Option<BackoffSignal> {
    [
        (TRY_LATER, BackoffSignal::TryLater),
        (LIMIT_REACHED, BackoffSignal::LimitReached),
        (SERVERS_BUSY, BackoffSignal::ServersBusy),
        (ALREADY_DOWNLOADING, BackoffSignal::AlreadyDownloading),
    ]
    .into_iter()
    .find_map(|(phrase, signal)| page.contains(phrase).then_some(signal))
}

/// Extracts the stage-2 URL from the landing page form.
#[must_use]
pub fn next_stage_url(page: &str) -> Option<String> {
    first_capture(page, &NEXT_STAGE_RE)
}

/// Extracts the file size in bytes from the ticket page.
#[must_use]
pub fn file_size(page: &str) -> Option<u64> {
    first_capture(page, &FILE_SIZE_RE)?
        .parse::<u64>()
        .ok()
        .map(|kb| kb.saturating_mul(BYTES_PER_KB))
}

/// Extracts the countdown (seconds) the site enforces before the mirror link works.
#[must_use]
pub fn countdown_secs(page: &str) -> Option<u64> {
    first_capture(page, &COUNTDOWN_RE)?.parse().ok()
}

/// Extracts every mirror candidate in page order.
#[must_use]
pub fn mirrors(page: &str) -> Vec<Mirror> {
    MIRROR_RE
        .captures_iter(page)
        .filter_map(|caps| {
            let url = caps.get(1)?.as_str();
            let name = caps.get(2)?.as_str().trim();
            Some(Mirror::new(name, url))
        })
        .collect()
}

fn first_capture(page: &str, regex: &Regex) -> Option<String> {
    regex
        .captures(page)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}
