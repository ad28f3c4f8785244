//! Transport seam between the engine and the network.
//!
//! The engine never talks to `reqwest` directly. It asks a [`Transport`] for
//! a page (buffered in memory) or a file (streamed to disk), which keeps the
//! stage protocol testable against scripted responses.

use std::ops::ControlFlow;
use std::path::Path;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use super::DownloadError;

/// Per-chunk progress callback; `Break` stops the transfer.
pub type ChunkCallback<'a> = dyn FnMut(usize) -> ControlFlow<()> + Send + 'a;

/// A single request to the hosting site.
///
/// Without a form body the request is a plain GET. With one it is sent as a
/// url-encoded POST, which is how the site's forms submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Target URL.
    pub url: String,
    /// Url-encoded form body.
    pub form: Option<String>,
    /// Raw `Cookie` header value.
    pub cookie: Option<String>,
}

impl FetchRequest {
    /// Plain GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            form: None,
            cookie: None,
        }
    }

    /// Attaches a url-encoded form body.
    #[must_use]
    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    /// Attaches a cookie header when one is configured.
    #[must_use]
    pub fn with_cookie(mut self, cookie: Option<&str>) -> Self {
        self.cookie = cookie.map(str::to_string);
        self
    }
}

/// A page fetched into memory.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body decoded as text.
    pub body: String,
}

impl PageResponse {
    /// Whether the site answered 200 OK.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// A response streamed to a file.
#[derive(Debug, Clone)]
pub struct FileResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Bytes written to the destination (0 when the status was not a success).
    pub bytes_written: u64,
}

impl FileResponse {
    /// Whether the mirror answered 200 OK.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// HTTP transport used by the download engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches a page and buffers its body in memory.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when no response could be obtained.
    async fn fetch_page(&self, request: &FetchRequest) -> Result<PageResponse, DownloadError>;

    /// Streams a response body to `path`, calling `on_chunk` for each chunk.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network or file failures, or when the
    /// callback breaks the transfer.
    async fn fetch_to_file(
        &self,
        request: &FetchRequest,
        path: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<FileResponse, DownloadError>;
}
