//! Install layout.
//!
//! This module contains the code to move freshly extracted directories and files into the slots
//! of the install layout.

use crate::error::InstallError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, trace, warn};

/// Name of the slot holding the MCP tools.
pub(crate) const MCP_SLOT: &str = "mcp";

/// Outcome of [relocate_into_slot].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Relocation {
    /// The source was moved to the contained path.
    Moved(PathBuf),
    /// The source did not exist, nothing happened.
    Skipped,
}

/// Finds the single child of `parent` named `<base_name>-<suffix>`.
///
/// Archive services name the root folder after the repository plus branch, tag or commit.
#[instrument(level = "trace")]
pub(crate) fn find_branch_dir(parent: &Path, base_name: &str) -> Result<PathBuf, InstallError> {
    let prefix = format!("{base_name}-");

    let mut matches = Vec::new();
    for entry in fs::read_dir(parent).map_err(InstallError::io(parent))? {
        let entry = entry.map_err(InstallError::io(parent))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) {
            matches.push(name.into_owned());
        }
    }

    match matches.len() {
        0 => Err(InstallError::NotFound(format!("directory '{prefix}*' in {}", parent.display()))),
        1 => Ok(parent.join(&matches[0])),
        _ => {
            matches.sort();
            Err(InstallError::AmbiguousMatch {
                parent: parent.to_path_buf(),
                prefix,
                matches,
            })
        }
    }
}

/// Moves the single `<base_name>-<suffix>` child of `parent` to `dest_dir/<base_name>`.
///
/// Returns the final path.
#[instrument(level = "trace")]
pub(crate) fn relocate_branch_dir(parent: &Path, base_name: &str, dest_dir: &Path) -> Result<PathBuf, InstallError> {
    let from = find_branch_dir(parent, base_name)?;
    let to = dest_dir.join(base_name);

    fs::create_dir_all(dest_dir).map_err(InstallError::io(dest_dir))?;
    move_path(&from, &to)?;
    debug!(from = %from.display(), to = %to.display(), "relocated branch directory");

    Ok(to)
}

/// Moves `source` to `slot_dir/name`, creating `slot_dir` if necessary.
///
/// A missing `source` is not an error, optional artifacts must not abort the installation.
#[instrument(level = "trace")]
pub(crate) fn relocate_into_slot(source: &Path, slot_dir: &Path, name: &str) -> Result<Relocation, InstallError> {
    fs::create_dir_all(slot_dir).map_err(InstallError::io(slot_dir))?;

    if fs::symlink_metadata(source).is_err() {
        warn!(source = %source.display(), "skipping missing source");
        return Ok(Relocation::Skipped);
    }

    let to = slot_dir.join(name);
    move_path(source, &to)?;
    trace!(from = %source.display(), to = %to.display(), "relocated into slot");

    Ok(Relocation::Moved(to))
}

/// Moves the contents of the directory `source` into `dest_dir`, merging with whatever is there.
///
/// Existing directories are merged, existing files are overwritten. `source` is removed afterwards.
#[instrument(level = "trace")]
pub(crate) fn merge_into(source: &Path, dest_dir: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(dest_dir).map_err(InstallError::io(dest_dir))?;

    let mut options = fs_extra::dir::CopyOptions::new();
    options.content_only = true;
    options.overwrite = true;

    let moved = fs_extra::dir::move_dir(source, dest_dir, &options).map_err(fs_extra_failure(dest_dir))?;
    trace!(moved, from = %source.display(), to = %dest_dir.display(), "merged directory");

    Ok(())
}

// Renames `from` to `to`, falling back to copy and delete (e.g. across filesystems).
#[doc(hidden)]
fn move_path(from: &Path, to: &Path) -> Result<(), InstallError> {
    let Err(err) = fs::rename(from, to) else {
        return Ok(());
    };

    // never merge into an existing target
    if to.exists() {
        return Err(InstallError::io(to)(err));
    }

    debug!(%err, from = %from.display(), to = %to.display(), "rename failed, moving by copy instead");
    if from.is_dir() {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.content_only = true;
        fs_extra::dir::move_dir(from, to, &options).map_err(fs_extra_failure(to))?;
    } else {
        let options = fs_extra::file::CopyOptions::new();
        fs_extra::file::move_file(from, to, &options).map_err(fs_extra_failure(to))?;
    }

    Ok(())
}

// Wraps an error of `fs_extra` together with the path it occurred at.
#[doc(hidden)]
fn fs_extra_failure(path: &Path) -> impl FnOnce(fs_extra::error::Error) -> InstallError + '_ {
    move |err| InstallError::io(path)(io::Error::other(err.to_string()))
}
