//! Errors.
//!
//! This module contains the error type shared by the extraction and layout code.

use std::io;
use std::path::{Path, PathBuf};

/// The error type for fetching, extracting and organizing artifacts.
#[derive(Debug, thiserror::Error)]
pub(crate) enum InstallError {
    /// The download failed (transport error, non-success status or checksum mismatch).
    #[error("failed to fetch {url}: {reason}")]
    NetworkFailure { url: String, reason: String },
    /// The bytes could not be parsed as the expected archive format.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),
    /// An archive entry would be written outside of the destination directory.
    #[error("entry '{0}' escapes the destination directory")]
    UnsafePath(String),
    /// A filesystem operation failed.
    #[error("I/O failure at {}: {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// An expected file or directory is absent.
    #[error("{0} not found")]
    NotFound(String),
    /// More than one directory matched where exactly one was expected.
    #[error("more than one match for '{prefix}' in {}: {}", parent.display(), matches.join(", "))]
    AmbiguousMatch { parent: PathBuf, prefix: String, matches: Vec<String> },
}

impl InstallError {
    /// Returns a closure that wraps an [io::Error] together with the path it occurred at.
    ///
    /// Meant for `map_err`: `fs::create_dir_all(&dir).map_err(InstallError::io(&dir))?`.
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::IoFailure {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for InstallError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::MalformedArchive(err.to_string())
    }
}
