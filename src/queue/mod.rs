//! Crash-safe work queue of pending download links.
//!
//! The queue lives in three plain-text files (see [`QueuePaths`]). Outside
//! tools append new links to the staging file at any time; every
//! [`WorkQueue::refresh`] merges them behind the primary list and commits the
//! result atomically.
//!
//! # Crash safety
//!
//! A merge writes the scratch file, truncates the staging file and renames the
//! scratch file over the primary. A scratch file found at start-up means a
//! merge was interrupted; [`WorkQueue::open`] refuses to continue rather than
//! pick one of the two candidate lists.
//!
//! # Example
//!
//! ```no_run
//! use fetchbot_core::queue::{QueuePaths, WorkQueue};
//!
//! # async fn example() -> Result<(), fetchbot_core::queue::QueueError> {
//! let mut queue = WorkQueue::open(QueuePaths::in_dir(".")).await?;
//! loop {
//!     queue.refresh().await?;
//!     let Some(entry) = queue.front() else { break };
//!     println!("next: {}", entry.url);
//!     queue.pop_front().await?;
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod repository;

use std::collections::VecDeque;

use tracing::{info, instrument};

pub use error::QueueError;
pub use repository::{
    EXTENDS_FILE, PRIMARY_FILE, QueuePaths, TEMPORA_FILE, commit, load_list, parse_lines,
};

/// Which list an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Loaded from the primary list.
    Primary,
    /// Merged in from the staging list.
    Extension,
}

/// One pending link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// The link, as written in the file.
    pub url: String,
    /// Where the entry came from.
    pub origin: EntryOrigin,
}

impl QueueEntry {
    fn new(url: String, origin: EntryOrigin) -> Self {
        Self { url, origin }
    }
}

/// FIFO of pending links backed by the queue files.
///
/// The in-memory list always matches the last committed primary file.
/// Entries are not deduplicated.
#[derive(Debug)]
pub struct WorkQueue {
    paths: QueuePaths,
    pending: VecDeque<QueueEntry>,
}

impl WorkQueue {
    /// Loads and merges both lists and commits the result.
    ///
    /// # Errors
    ///
    /// - [`QueueError::UncleanShutdown`] if the scratch file exists.
    /// - Any read or commit error.
    #[instrument(skip(paths), fields(primary = %paths.primary.display()))]
    pub async fn open(paths: QueuePaths) -> Result<Self, QueueError> {
        if tokio::fs::try_exists(&paths.tempora).await.unwrap_or(true) {
            return Err(QueueError::UncleanShutdown {
                path: paths.tempora.clone(),
            });
        }

        let pending = load_list(&paths.primary)
            .await?
            .into_iter()
            .map(|url| QueueEntry::new(url, EntryOrigin::Primary))
            .collect();
        let mut queue = Self { paths, pending };
        let merged = queue.merge_extension().await?;
        info!(pending = queue.len(), merged, "queue opened");
        Ok(queue)
    }

    /// Merges newly staged links behind the pending ones and commits.
    ///
    /// Returns how many links were merged.
    ///
    /// # Errors
    ///
    /// Returns any read or commit error.
    pub async fn refresh(&mut self) -> Result<usize, QueueError> {
        let merged = self.merge_extension().await?;
        if merged > 0 {
            info!(merged, pending = self.len(), "picked up staged links");
        }
        Ok(merged)
    }

    /// The next link to service.
    #[must_use]
    pub fn front(&self) -> Option<&QueueEntry> {
        self.pending.front()
    }

    /// Removes the front entry and commits.
    ///
    /// Staged links are merged in the same commit, so nothing appended since
    /// the last refresh is dropped when the staging file is truncated.
    ///
    /// # Errors
    ///
    /// Returns any read or commit error.
    pub async fn pop_front(&mut self) -> Result<Option<QueueEntry>, QueueError> {
        let staged = load_list(&self.paths.extends).await?;
        let popped = self.pending.pop_front();
        self.extend(staged);
        commit(&self.paths, &self.urls()).await?;
        Ok(popped)
    }

    /// Number of pending links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no links are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending entries in service order.
    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.pending.iter()
    }

    /// The files backing this queue.
    #[must_use]
    pub fn paths(&self) -> &QueuePaths {
        &self.paths
    }

    async fn merge_extension(&mut self) -> Result<usize, QueueError> {
        let staged = load_list(&self.paths.extends).await?;
        let merged = staged.len();
        self.extend(staged);
        commit(&self.paths, &self.urls()).await?;
        Ok(merged)
    }

    fn extend(&mut self, staged: Vec<String>) {
        self.pending.extend(
            staged
                .into_iter()
                .map(|url| QueueEntry::new(url, EntryOrigin::Extension)),
        );
    }

    fn urls(&self) -> Vec<&str> {
        self.pending.iter().map(|entry| entry.url.as_str()).collect()
    }
}
