//! On-disk layout of the queue: three plain-text files in one directory.
//!
//! - `primary.queue`: the authoritative pending list
//! - `extends.queue`: staging list that outside tools append to
//! - `tempora.queue`: scratch file that only exists during a merge
//!
//! One URL per line. Blank lines and lines starting with `#` are ignored.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use super::QueueError;

/// Default file names inside the queue directory.
pub const PRIMARY_FILE: &str = "primary.queue";
/// Staging list name.
pub const EXTENDS_FILE: &str = "extends.queue";
/// Scratch file name.
pub const TEMPORA_FILE: &str = "tempora.queue";

/// Locations of the three queue files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    /// Authoritative pending list.
    pub primary: PathBuf,
    /// Append-only staging list.
    pub extends: PathBuf,
    /// Merge scratch file.
    pub tempora: PathBuf,
}

impl QueuePaths {
    /// The standard file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            primary: dir.join(PRIMARY_FILE),
            extends: dir.join(EXTENDS_FILE),
            tempora: dir.join(TEMPORA_FILE),
        }
    }
}

/// Extracts the entries of a queue file's contents, in order.
///
/// Lines are kept verbatim apart from the line ending. A comment starts with
/// `#` in the first column; blank or whitespace-only lines are skipped.
#[must_use]
pub fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Reads a queue file; a missing file is an empty list.
///
/// # Errors
///
/// Returns [`QueueError::Read`] if the file exists but cannot be read.
pub async fn load_list(path: &Path) -> Result<Vec<String>, QueueError> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(parse_lines(&contents)),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(error) => Err(QueueError::read(path, error)),
    }
}

/// Writes `entries` as the new primary list and empties the staging list.
///
/// The list is written and synced to the scratch file first, then renamed
/// over the primary file, so the primary is always either the old or the new
/// list. The staging file is truncated rather than removed so that writers
/// holding it open keep a valid handle.
///
/// # Errors
///
/// - [`QueueError::Scratch`] if the scratch file cannot be created or written.
/// - [`QueueError::Commit`] if truncating the staging file or the final
///   rename fails. The scratch file is left behind in that case.
#[instrument(level = "debug", skip(paths, entries), fields(entries = entries.len()))]
pub async fn commit<S: AsRef<str>>(paths: &QueuePaths, entries: &[S]) -> Result<(), QueueError> {
    match fs::remove_file(&paths.tempora).await {
        Ok(()) => warn!(path = %paths.tempora.display(), "removed stale queue scratch file"),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => return Err(QueueError::scratch(&paths.tempora, error)),
    }

    write_scratch(&paths.tempora, entries)
        .await
        .map_err(|error| QueueError::scratch(&paths.tempora, error))?;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&paths.extends)
        .await
        .map_err(|error| QueueError::commit(&paths.extends, error))?;

    fs::rename(&paths.tempora, &paths.primary)
        .await
        .map_err(|error| QueueError::commit(&paths.primary, error))?;

    debug!(primary = %paths.primary.display(), "queue committed");
    Ok(())
}

async fn write_scratch<S: AsRef<str>>(path: &Path, entries: &[S]) -> std::io::Result<()> {
    let file = File::create(path).await?;
    let mut writer = BufWriter::new(file);
    for entry in entries {
        writer.write_all(entry.as_ref().as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_skips_comments_and_blanks() {
        let contents = "# header\n\nhttp://a/files/1/x\n   \n#http://b/files/2/y\nhttp://c/files/3/z\n";
        assert_eq!(
            parse_lines(contents),
            vec!["http://a/files/1/x", "http://c/files/3/z"]
        );
    }

    #[test]
    fn test_parse_lines_keeps_entries_verbatim() {
        let contents = "  #not-a-comment\n http://a/files/1/x \n";
        assert_eq!(
            parse_lines(contents),
            vec!["  #not-a-comment", " http://a/files/1/x "]
        );
    }

    #[test]
    fn test_parse_lines_handles_crlf() {
        assert_eq!(parse_lines("http://a/files/1/x\r\n"), vec!["http://a/files/1/x"]);
    }

    #[tokio::test]
    async fn test_load_list_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let list = load_list(&dir.path().join("nope.queue")).await.unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_commit_replaces_primary_and_truncates_extends() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = QueuePaths::in_dir(dir.path());
        std::fs::write(&paths.primary, "old\n").unwrap();
        std::fs::write(&paths.extends, "staged\n").unwrap();

        commit(&paths, &["one", "two"]).await.unwrap();

        assert_eq!(std::fs::read_to_string(&paths.primary).unwrap(), "one\ntwo\n");
        assert!(paths.extends.exists());
        assert_eq!(std::fs::metadata(&paths.extends).unwrap().len(), 0);
        assert!(!paths.tempora.exists());
    }

    #[tokio::test]
    async fn test_commit_fails_when_scratch_cannot_be_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = QueuePaths::in_dir(dir.path().join("missing"));

        let err = commit(&paths, &["one"]).await.unwrap_err();
        assert!(matches!(err, QueueError::Scratch { .. }), "{err:?}");
    }
}
