//! Archive.
//!
//! This module contains the code to unpack ZIP and gzip-compressed TAR archives into a directory.

use crate::error::InstallError;
use crate::permissions;
use flate2::read::GzDecoder;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{instrument, trace, warn};
use zip::ZipArchive;

/// The archive formats an artifact can be shipped in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArchiveKind {
    /// ZIP with central directory.
    Zip,
    /// TAR wrapped in a gzip stream.
    TarGz,
}

impl ArchiveKind {
    /// Derives the archive kind from the file name at the end of the given URL.
    ///
    /// Anything that does not look like a tarball is treated as ZIP, which also covers
    /// the "download by branch" endpoints without any extension.
    pub(crate) fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") { Self::TarGz } else { Self::Zip }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => write!(f, "zip"),
            Self::TarGz => write!(f, "tar.gz"),
        }
    }
}

/// Unpacks the archive of the given kind into `dest`.
///
/// Returns the last file entry for tarballs (see [extract_tar_gz]) and `None` for ZIP archives.
pub(crate) fn extract(kind: ArchiveKind, data: &[u8], dest: &Path) -> Result<Option<PathBuf>, InstallError> {
    match kind {
        ArchiveKind::Zip => extract_zip(data, dest).map(|()| None),
        ArchiveKind::TarGz => extract_tar_gz(data, dest),
    }
}

/// Unpacks a ZIP archive into `dest`, creating it if necessary.
///
/// The central directory is parsed before anything is written, so unparseable input leaves
/// the filesystem untouched. Files written before a later failure are not rolled back.
#[instrument(level = "trace", skip(data), fields(len = data.len()))]
pub(crate) fn extract_zip(data: &[u8], dest: &Path) -> Result<(), InstallError> {
    let mut zip = ZipArchive::new(Cursor::new(data))?;

    fs::create_dir_all(dest).map_err(InstallError::io(dest))?;

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let Some(name) = file.enclosed_name() else {
            return Err(InstallError::UnsafePath(file.name().to_string()));
        };

        let path = dest.join(name);
        trace!("unpacking {path:?}");

        if file.is_dir() {
            fs::create_dir_all(&path).map_err(InstallError::io(&path))?;
            continue;
        }

        let entry_name = file.name().to_string();
        write_entry(&path, &entry_name, &mut file)?;

        // keep the executable bit, if the archive was created on a unix host
        if is_executable(file.unix_mode()) {
            permissions::mark_executable(&path)?;
        }
    }

    Ok(())
}

/// Unpacks a gzip-compressed TAR archive into `dest`, creating it if necessary.
///
/// Every file is marked executable regardless of the mode stored in the archive.
/// Returns the path of the last file entry in archive order, if there was any.
#[instrument(level = "trace", skip(data), fields(len = data.len()))]
pub(crate) fn extract_tar_gz(data: &[u8], dest: &Path) -> Result<Option<PathBuf>, InstallError> {
    let malformed = |err: io::Error| InstallError::MalformedArchive(err.to_string());

    fs::create_dir_all(dest).map_err(InstallError::io(dest))?;

    let mut last_file = None;
    let mut archive = Archive::new(GzDecoder::new(data));
    for entry in archive.entries().map_err(malformed)? {
        let mut entry = entry.map_err(malformed)?;
        let name = entry.path().map_err(malformed)?.into_owned();
        let path = safe_join(dest, &name)?;
        trace!("unpacking {path:?}");

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&path).map_err(InstallError::io(&path))?;
        } else if entry_type.is_file() {
            if path == dest {
                warn!(name = %name.display(), "skipping file entry without name");
                continue;
            }

            write_entry(&path, &name.display().to_string(), &mut entry)?;
            permissions::mark_executable(&path)?;
            last_file = Some(path);
        } else {
            warn!(name = %name.display(), ?entry_type, "skipping unsupported entry");
        }
    }

    Ok(last_file)
}

// Whether the stored unix mode carries any execute bit.
#[doc(hidden)]
#[inline]
fn is_executable(mode: Option<u32>) -> bool {
    mode.is_some_and(|mode| mode & 0o111 != 0)
}

// Streams the entry content to the given path, creating missing parent directories.
//
// Corrupt or truncated entry data is reported as malformed archive, everything else as I/O failure.
#[doc(hidden)]
fn write_entry<R: Read>(path: &Path, name: &str, content: &mut R) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(InstallError::io(parent))?;
    }

    let mut outfile = File::create(path).map_err(InstallError::io(path))?;
    io::copy(content, &mut outfile).map_err(|err| match err.kind() {
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => InstallError::MalformedArchive(format!("{name}: {err}")),
        _ => InstallError::io(path)(err),
    })?;

    Ok(())
}

/// Joins the relative entry name onto `root`, refusing names that would end up outside of it.
pub(crate) fn safe_join(root: &Path, name: &Path) -> Result<PathBuf, InstallError> {
    let unsafe_path = || InstallError::UnsafePath(name.display().to_string());

    let mut path = root.to_path_buf();
    let mut depth = 0usize;
    for component in name.components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(unsafe_path)?;
                path.pop();
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path()),
        }
    }

    Ok(path)
}
