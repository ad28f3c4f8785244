//! Error types for queue operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during queue operations.
///
/// Every variant is fatal to the driver: the queue files are the only record
/// of pending work, so guessing past any of these could lose or duplicate it.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A scratch file from an interrupted merge is present.
    #[error(
        "unfinished queue merge detected: {path}\n  Suggestion: Compare it with the primary queue, keep the right one and delete the other"
    )]
    UncleanShutdown {
        /// The leftover scratch file.
        path: PathBuf,
    },

    /// A queue file exists but could not be read.
    #[error("cannot read queue file {path}: {source}")]
    Read {
        /// The file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The scratch file could not be opened or written.
    #[error("cannot write queue scratch file {path}: {source}")]
    Scratch {
        /// The scratch file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Truncating the extension file or promoting the scratch file failed.
    #[error("cannot commit queue to {path}: {source}")]
    Commit {
        /// The file being replaced or truncated.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl QueueError {
    /// Creates a `Read` error.
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a `Scratch` error.
    #[must_use]
    pub fn scratch(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Scratch {
            path: path.into(),
            source,
        }
    }

    /// Creates a `Commit` error.
    #[must_use]
    pub fn commit(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Commit {
            path: path.into(),
            source,
        }
    }
}
