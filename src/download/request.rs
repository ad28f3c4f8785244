//! Accepted download requests.

use url::Url;

use super::classifier::is_file_link;

/// A file link that passed validation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    file_name: String,
}

impl DownloadRequest {
    /// Validates `url` against the canonical `<scheme>://<host>/files/<id>/<name>` shape.
    ///
    /// Returns `None` for anything else, including `.`/`..` names that would
    /// escape the download directory.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        if !is_file_link(url) {
            return None;
        }
        let parsed = Url::parse(url).ok()?;
        let file_name = parsed.path_segments()?.next_back()?.to_string();
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            file_name,
        })
    }

    /// The link as submitted.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Final path segment, used as the saved file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}
