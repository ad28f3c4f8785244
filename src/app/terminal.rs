//! Live status line on the terminal.

use std::time::Duration;

use fetchbot_core::download::{DownloadState, DownloadStatus, throughput};
use fetchbot_core::driver::{ProgressObserver, ReportOutcome};
use indicatif::{ProgressBar, ProgressStyle};

/// Renders driver events as a single spinner line plus one line per outcome.
#[derive(Debug, Default)]
pub struct TerminalObserver {
    bar: Option<ProgressBar>,
}

impl TerminalObserver {
    fn start_bar(&mut self, url: &str) -> &ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(url.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        self.bar.insert(bar)
    }
}

impl ProgressObserver for TerminalObserver {
    fn on_start(&mut self, url: &str) {
        self.start_bar(url)
            .set_message(DownloadStatus::Preparing.description());
    }

    fn on_progress(&mut self, snapshot: &DownloadState) {
        if let Some(bar) = &self.bar {
            bar.set_message(format_status_line(snapshot));
        }
    }

    fn on_finish(&mut self, outcome: ReportOutcome, snapshot: &DownloadState) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        println!("{}", format_outcome_line(outcome, snapshot));
    }

    fn on_invalid(&mut self, url: &str) {
        println!("{} {url}", ReportOutcome::Invalid);
    }
}

/// One line describing an in-flight request.
#[must_use]
pub fn format_status_line(snapshot: &DownloadState) -> String {
    match snapshot.status {
        DownloadStatus::Downloading => {
            let eta = snapshot
                .eta()
                .map_or_else(|| "--:--:--".to_string(), format_hms);
            format!(
                "{} KB {} | avg {:.1} KB/s | now {:.1} KB/s | size {} KB | eta {}",
                snapshot.bytes_transferred / 1000,
                format_hms(Duration::from_micros(snapshot.elapsed_micros)),
                snapshot.average_speed() / 1000.0,
                snapshot.instantaneous_speed / 1000.0,
                snapshot.total_size / 1000,
                eta,
            )
        }
        status if status.is_waiting() => {
            format!("{}: {}s", status.description(), snapshot.wait_remaining)
        }
        status => status.description().to_string(),
    }
}

fn format_outcome_line(outcome: ReportOutcome, snapshot: &DownloadState) -> String {
    if outcome == ReportOutcome::Ok {
        let kb_per_sec = throughput(snapshot.bytes_transferred, snapshot.elapsed_micros) / 1000.0;
        format!(
            "{outcome} {} ({} KB in {}, {kb_per_sec:.3} KB/s)",
            snapshot.url,
            snapshot.bytes_transferred / 1000,
            format_hms(Duration::from_micros(snapshot.elapsed_micros)),
        )
    } else {
        format!("{outcome} {}", snapshot.url)
    }
}

fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
