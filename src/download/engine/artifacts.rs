//! Per-stage page and header dumps kept in the sessions directory.
//!
//! Writes are best effort: a full disk or a missing directory must never
//! cost a download, so failures are logged and swallowed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use reqwest::header::HeaderMap;
use tracing::debug;

pub(super) const LANDING_BODY: &str = "-body-1.html";
pub(super) const LANDING_HEAD: &str = "-head-1.html";
pub(super) const TICKET_BODY: &str = "-body-2.html";
pub(super) const TICKET_HEAD: &str = "-head-2.html";
pub(super) const TRANSFER_HEAD: &str = "-head-3.html";

#[derive(Debug, Clone)]
pub(super) struct SessionArtifacts {
    dir: PathBuf,
}

impl SessionArtifacts {
    pub(super) fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Path of the artifact for `file_name` with `suffix`.
    pub(super) fn path(&self, file_name: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{file_name}{suffix}"))
    }

    pub(super) async fn save_body(&self, file_name: &str, suffix: &str, body: &str) {
        self.write(self.path(file_name, suffix), body.as_bytes()).await;
    }

    pub(super) async fn save_head(
        &self,
        file_name: &str,
        suffix: &str,
        status: u16,
        headers: &HeaderMap,
    ) {
        let rendered = render_head(status, headers);
        self.write(self.path(file_name, suffix), rendered.as_bytes())
            .await;
    }

    async fn write(&self, path: PathBuf, contents: &[u8]) {
        if let Err(error) = tokio::fs::write(&path, contents).await {
            debug!(path = %path.display(), %error, "session artifact not saved");
        }
    }
}

/// Status line followed by one `name: value` line per header.
fn render_head(status: u16, headers: &HeaderMap) -> String {
    let mut out = format!("HTTP/1.1 {status}\n");
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        let _ = writeln!(out, "{name}: {value}");
    }
    out
}
