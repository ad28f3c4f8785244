//! Canned site pages and a scripted in-process transport.

use std::collections::VecDeque;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fetchbot_core::download::constants::TICKET_FORM;
use fetchbot_core::download::{
    ChunkCallback, DownloadEngine, DownloadError, DownloadState, FetchRequest, FileResponse,
    PageResponse, Transport,
};
use reqwest::header::HeaderMap;
use tokio::sync::Notify;

pub const FILE_URL: &str = "http://host.example/files/123/archive.zip";
pub const TICKET_URL: &str = "http://rs7.host.example/files/123/archive.zip";
pub const MIRROR_URL: &str = "http://rs7cg.host.example/files/123/archive.zip";

pub fn landing_page(next_url: &str) -> String {
    format!(
        r#"<html><body>
<form id="ff" action="{next_url}" method="post">
<input type="submit" value="Free user" />
</form></body></html>"#
    )
}

pub fn ticket_page(size_kb: u64, countdown: Option<u64>, mirrors: &[(&str, &str)]) -> String {
    let mut page = format!(
        r#"<html><body>
<p class="downloadlink">{FILE_URL} <font style="color:#8E908F;">| {size_kb} KB</font></p>
"#
    );
    if let Some(secs) = countdown {
        page.push_str(&format!("<script>var c={secs};</script>\n"));
    }
    page.push_str(r#"<form name="dlf" action="" method="post">"#);
    page.push('\n');
    for (name, url) in mirrors {
        page.push_str(&format!(
            r#"<input type="radio" name="mirror" onclick="document.dlf.action=\'{url}\';" /> {name}<br />"#
        ));
        page.push('\n');
    }
    page.push_str("</form></body></html>");
    page
}

pub fn message_page(message: &str) -> String {
    format!("<html><body><p>{message}</p></body></html>")
}

#[derive(Debug, Clone)]
pub enum PageReply {
    Page { status: u16, body: String },
    Error,
    /// Kills the calling task, as a bug in the worker would.
    Panic,
}

impl PageReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Page {
            status: 200,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FileReply {
    Body { status: u16, chunks: Vec<Vec<u8>> },
    Error,
}

impl FileReply {
    pub fn ok(chunks: &[&[u8]]) -> Self {
        Self::Body {
            status: 200,
            chunks: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
        }
    }
}

/// Serves queued replies per stage, falling back to a successful flow.
#[derive(Debug)]
pub struct ScriptedTransport {
    landing: Mutex<VecDeque<PageReply>>,
    ticket: Mutex<VecDeque<PageReply>>,
    file: Mutex<VecDeque<FileReply>>,
    requests: Mutex<Vec<FetchRequest>>,
    gate: Option<Arc<Notify>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            landing: Mutex::new(VecDeque::new()),
            ticket: Mutex::new(VecDeque::new()),
            file: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }
}

impl ScriptedTransport {
    /// Each landing fetch waits for one permit on `gate`.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_landing(&self, reply: PageReply) {
        self.landing.lock().unwrap().push_back(reply);
    }

    pub fn push_ticket(&self, reply: PageReply) {
        self.ticket.lock().unwrap().push_back(reply);
    }

    pub fn push_file(&self, reply: FileReply) {
        self.file.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn landing_calls(&self) -> usize {
        self.requests().iter().filter(|r| r.form.is_none()).count()
    }

    pub fn ticket_calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.form.as_deref() == Some(TICKET_FORM))
            .count()
    }

    pub fn file_calls(&self) -> Vec<FetchRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.form.is_some() && r.form.as_deref() != Some(TICKET_FORM))
            .collect()
    }

    fn default_ticket() -> PageReply {
        PageReply::ok(ticket_page(1, Some(0), &[("Cogent", MIRROR_URL)]))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch_page(&self, request: &FetchRequest) -> Result<PageResponse, DownloadError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = if request.form.is_none() {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.landing.lock().unwrap().pop_front();
            next.unwrap_or_else(|| PageReply::ok(landing_page(TICKET_URL)))
        } else {
            let next = self.ticket.lock().unwrap().pop_front();
            next.unwrap_or_else(Self::default_ticket)
        };

        match reply {
            PageReply::Page { status, body } => Ok(PageResponse {
                status,
                headers: HeaderMap::new(),
                body,
            }),
            PageReply::Error => Err(DownloadError::timeout(&request.url)),
            PageReply::Panic => panic!("scripted transport panic at {}", request.url),
        }
    }

    async fn fetch_to_file(
        &self,
        request: &FetchRequest,
        path: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<FileResponse, DownloadError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.file.lock().unwrap().pop_front();
        let reply = next.unwrap_or_else(|| FileReply::ok(&[b"hello", b"world"]));

        let (status, chunks) = match reply {
            FileReply::Body { status, chunks } => (status, chunks),
            FileReply::Error => return Err(DownloadError::timeout(&request.url)),
        };
        if status != 200 {
            return Ok(FileResponse {
                status,
                headers: HeaderMap::new(),
                bytes_written: 0,
            });
        }

        let mut file = std::fs::File::create(path).map_err(|e| DownloadError::io(path, e))?;
        let mut written = 0;
        for chunk in chunks {
            tokio::time::sleep(Duration::from_millis(1)).await;
            file.write_all(&chunk)
                .map_err(|e| DownloadError::io(path, e))?;
            written += chunk.len() as u64;
            if let ControlFlow::Break(()) = on_chunk(chunk.len()) {
                return Err(DownloadError::canceled(&request.url));
            }
        }
        Ok(FileResponse {
            status,
            headers: HeaderMap::new(),
            bytes_written: written,
        })
    }
}

/// Polls until the engine reports a terminal status.
pub async fn wait_for_terminal(engine: &DownloadEngine) -> DownloadState {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = engine.progress();
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("engine did not settle in time")
}
