//! Download status machine labels and the shared state snapshot.

use std::fmt;
use std::time::Duration;

use super::telemetry::{eta, throughput};

/// Lifecycle of the single active request.
///
/// `None`, `Downloaded`, `Canceled` and `NotFound` are idle states in which a
/// new request may be accepted. Everything else means a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadStatus {
    /// Nothing requested yet.
    #[default]
    None,
    /// The last request finished and the file is on disk.
    Downloaded,
    /// The last request ran out of attempts.
    Canceled,
    /// The site reported the file as deleted, blocked or missing.
    NotFound,
    /// Fetching pages between waits.
    Preparing,
    /// Streaming the file from the selected mirror.
    Downloading,
    /// Sitting out the site's countdown.
    Waiting,
    /// Told to come back later.
    Later,
    /// Someone else is downloading from this address.
    Rivalry,
    /// Free-user transfer limit reached.
    Limit,
    /// Servers have no free slots.
    Busy,
    /// Unrecognised status code.
    Unknown,
}

impl DownloadStatus {
    /// Stable numeric code for this status.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Downloaded => 1,
            Self::Canceled => 2,
            Self::NotFound => 3,
            Self::Preparing => 4,
            Self::Downloading => 5,
            Self::Waiting => 6,
            Self::Later => 7,
            Self::Rivalry => 8,
            Self::Limit => 9,
            Self::Busy => 10,
            Self::Unknown => 11,
        }
    }

    /// Maps a numeric code back to a status; out-of-range codes become `Unknown`.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Downloaded,
            2 => Self::Canceled,
            3 => Self::NotFound,
            4 => Self::Preparing,
            5 => Self::Downloading,
            6 => Self::Waiting,
            7 => Self::Later,
            8 => Self::Rivalry,
            9 => Self::Limit,
            10 => Self::Busy,
            _ => Self::Unknown,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::None => "nothing to do",
            Self::Downloaded => "file downloaded",
            Self::Canceled => "download canceled",
            Self::NotFound => "file not found",
            Self::Preparing => "preparing download",
            Self::Downloading => "downloading",
            Self::Waiting => "waiting for download slot",
            Self::Later => "try again later",
            Self::Rivalry => "another download is running from this address",
            Self::Limit => "download limit reached",
            Self::Busy => "servers are busy",
            Self::Unknown => "unknown status",
        }
    }

    /// Whether a new request may be accepted in this status.
    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            Self::None | Self::Downloaded | Self::Canceled | Self::NotFound
        )
    }

    /// Whether this is a per-request outcome.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Downloaded | Self::Canceled | Self::NotFound)
    }

    /// Whether the worker is sitting out a timed wait in this status.
    #[must_use]
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            Self::Waiting | Self::Later | Self::Rivalry | Self::Limit | Self::Busy
        )
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// The one shared record describing the active request.
///
/// Cloned out as a whole, so every field of a snapshot belongs to the same
/// request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadState {
    /// Current status.
    pub status: DownloadStatus,
    /// URL of the active (or last) request.
    pub url: String,
    /// Bytes received in the current transfer.
    pub bytes_transferred: u64,
    /// Sum of per-chunk delays in the current transfer, in microseconds.
    pub elapsed_micros: u64,
    /// File size announced by the site, 0 until known.
    pub total_size: u64,
    /// Bytes per second over the last chunk.
    pub instantaneous_speed: f64,
    /// Seconds left in the current wait, 0 when not waiting.
    pub wait_remaining: u64,
}

impl DownloadState {
    /// Resets the record for a freshly accepted request.
    pub(crate) fn begin(&mut self, url: &str) {
        *self = Self {
            status: DownloadStatus::Preparing,
            url: url.to_string(),
            ..Self::default()
        };
    }

    /// Zeroes the transfer counters before a stage-3 transfer.
    pub(crate) fn reset_transfer(&mut self) {
        self.bytes_transferred = 0;
        self.elapsed_micros = 0;
        self.instantaneous_speed = 0.0;
    }

    /// Average throughput of the current transfer in bytes per second.
    #[must_use]
    pub fn average_speed(&self) -> f64 {
        throughput(self.bytes_transferred, self.elapsed_micros)
    }

    /// Estimated time to completion, when any bytes have arrived.
    #[must_use]
    pub fn eta(&self) -> Option<Duration> {
        eta(self.total_size, self.bytes_transferred, self.elapsed_micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trips_for_every_status() {
        for code in 0..=11u8 {
            assert_eq!(DownloadStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_out_of_range_code_is_unknown() {
        assert_eq!(DownloadStatus::from_code(12), DownloadStatus::Unknown);
        assert_eq!(DownloadStatus::from_code(255), DownloadStatus::Unknown);
        assert_eq!(DownloadStatus::from_code(200).description(), "unknown status");
    }

    #[test]
    fn test_idle_and_terminal_classification() {
        assert!(DownloadStatus::None.is_idle());
        assert!(!DownloadStatus::None.is_terminal());
        for status in [
            DownloadStatus::Downloaded,
            DownloadStatus::Canceled,
            DownloadStatus::NotFound,
        ] {
            assert!(status.is_idle());
            assert!(status.is_terminal());
        }
        for status in [
            DownloadStatus::Preparing,
            DownloadStatus::Downloading,
            DownloadStatus::Waiting,
            DownloadStatus::Later,
            DownloadStatus::Rivalry,
            DownloadStatus::Limit,
            DownloadStatus::Busy,
        ] {
            assert!(!status.is_idle(), "{status:?} should be in flight");
        }
    }

    #[test]
    fn test_waiting_statuses() {
        assert!(DownloadStatus::Later.is_waiting());
        assert!(DownloadStatus::Busy.is_waiting());
        assert!(!DownloadStatus::Downloading.is_waiting());
        assert!(!DownloadStatus::Preparing.is_waiting());
    }

    #[test]
    fn test_begin_resets_all_counters() {
        let mut state = DownloadState {
            status: DownloadStatus::Downloaded,
            url: "http://old.example/files/1/a".to_string(),
            bytes_transferred: 10,
            elapsed_micros: 20,
            total_size: 30,
            instantaneous_speed: 40.0,
            wait_remaining: 50,
        };
        state.begin("http://new.example/files/2/b");
        assert_eq!(state.status, DownloadStatus::Preparing);
        assert_eq!(state.url, "http://new.example/files/2/b");
        assert_eq!(state.bytes_transferred, 0);
        assert_eq!(state.elapsed_micros, 0);
        assert_eq!(state.total_size, 0);
        assert_eq!(state.wait_remaining, 0);
        assert!(state.instantaneous_speed.abs() < f64::EPSILON);
    }

    #[test]
    fn test_eta_from_snapshot() {
        let state = DownloadState {
            total_size: 4_000,
            bytes_transferred: 1_000,
            elapsed_micros: 2_000_000,
            ..DownloadState::default()
        };
        assert_eq!(state.eta(), Some(Duration::from_secs(6)));
        assert!((state.average_speed() - 500.0).abs() < 1e-9);
    }
}
