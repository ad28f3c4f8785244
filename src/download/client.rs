//! HTTP client wrapper implementing the [`Transport`] seam.
//!
//! This module provides the `HttpClient` struct which fetches the site's
//! pages into memory and streams the final file to disk, with a persistent
//! cookie store and timeout configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, RequestBuilder};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::DownloadError;
use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::transport::{ChunkCallback, FetchRequest, FileResponse, PageResponse, Transport};

/// Browser User-Agent: the site serves its human flow only to browsers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) \
    Gecko/20100101 Firefox/128.0";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP client for the hosting site.
///
/// Created once and reused for every stage so the cookie store carries the
/// session from the landing page through to the mirror.
///
/// # Example
///
/// ```no_run
/// use fetchbot_core::download::{FetchRequest, HttpClient, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let page = client
///     .fetch_page(&FetchRequest::get("http://host.example/files/1/a.zip"))
///     .await?;
/// println!("status {}", page.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeouts and an empty cookie store.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// `read_timeout_secs` bounds each read, not the whole request, so a slow
    /// but steady stage-3 transfer is never cut off.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(BROWSER_USER_AGENT)
            .cookie_provider(Arc::new(Jar::default()))
            .build()?;
        Ok(Self { client })
    }

    fn build_request(&self, request: &FetchRequest) -> Result<RequestBuilder, DownloadError> {
        let url = Url::parse(&request.url)
            .map_err(|_| DownloadError::invalid_url(request.url.clone()))?;

        let mut builder = match &request.form {
            Some(form) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(form.clone()),
            None => self.client.get(url),
        };
        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie);
        }
        Ok(builder)
    }

    async fn send(&self, request: &FetchRequest) -> Result<reqwest::Response, DownloadError> {
        self.build_request(request)?
            .send()
            .await
            .map_err(|e| DownloadError::network(&request.url, e))
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self), fields(url = %request.url))]
    async fn fetch_page(&self, request: &FetchRequest) -> Result<PageResponse, DownloadError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::network(&request.url, e))?;
        debug!(status, bytes = body.len(), "page fetched");

        Ok(PageResponse {
            status,
            headers,
            body,
        })
    }

    #[instrument(skip(self, on_chunk), fields(url = %request.url, path = %path.display()))]
    async fn fetch_to_file(
        &self,
        request: &FetchRequest,
        path: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<FileResponse, DownloadError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if !response.status().is_success() {
            debug!(status, "mirror refused transfer, nothing written");
            return Ok(FileResponse {
                status,
                headers,
                bytes_written: 0,
            });
        }

        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        let stream_result = stream_to_file(&mut file, response, &request.url, path, on_chunk).await;
        if stream_result.is_err() {
            // No partial byte ranges survive a failed attempt.
            debug!(path = %path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(path).await;
        }
        let bytes_written = stream_result?;

        Ok(FileResponse {
            status,
            headers,
            bytes_written,
        })
    }
}

/// Streams response body to file, returning bytes written.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    on_chunk: &mut ChunkCallback<'_>,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;

        if on_chunk(chunk.len()).is_break() {
            return Err(DownloadError::canceled(url));
        }
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
