//! CLI entry point for fetchbot.

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod app;
mod cli;

use app::config::{Settings, load_config};
use app::logging::init_tracing;
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let file_config = load_config(args.config.as_deref())?;
    let settings = Settings::resolve(&args, file_config);

    init_tracing(args.verbose, args.quiet, settings.diagnostic_log.as_deref())?;
    debug!(
        ?args,
        download_dir = %settings.download_dir.display(),
        sessions_dir = %settings.sessions_dir.display(),
        queue_dir = %settings.queue_dir.display(),
        cookie = settings.cookie.is_some(),
        "configuration resolved"
    );
    info!("fetchbot starting");

    let summary = app::run(&settings, args.quiet).await?;

    info!(
        ok = summary.ok,
        canceled = summary.canceled,
        not_found = summary.not_found,
        invalid = summary.invalid,
        total = summary.total(),
        "all links processed"
    );
    Ok(())
}
