//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Drain a queue of file links through the hosting site's free download flow.
///
/// Links are read from `primary.queue` in the queue directory. Links appended
/// to `extends.queue` while running are picked up before every download.
/// One `<OUTCOME> <url>` line per link is appended to the report log.
#[derive(Parser, Debug)]
#[command(name = "fetchbot")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory for finished files [default: ./d]
    #[arg(short = 'd', long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Directory for per-stage page dumps [default: ./s]
    #[arg(short = 's', long, value_name = "DIR")]
    pub sessions_dir: Option<PathBuf>,

    /// Directory holding the queue files [default: .]
    #[arg(long, value_name = "DIR")]
    pub queue_dir: Option<PathBuf>,

    /// Outcome report file [default: ./raports.queue]
    #[arg(short = 'r', long, value_name = "FILE")]
    pub report_log: Option<PathBuf>,

    /// Append a timestamped trace of every stage and wait to this file
    #[arg(long, value_name = "FILE")]
    pub diagnostic_log: Option<PathBuf>,

    /// Append periodic transfer speed samples to this file
    #[arg(long, value_name = "FILE")]
    pub speed_report: Option<PathBuf>,

    /// Seconds between speed samples (1-3600) [default: 10]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub speed_interval: Option<u64>,

    /// Config file [default: $XDG_CONFIG_HOME/fetchbot/config.toml]
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
