//! Permissions.
//!
//! This module contains the code to make extracted files runnable.

use crate::error::InstallError;
use std::path::Path;
use tracing::{debug, instrument, trace};

/// Mode bits for extracted executables (`rwxr-xr-x`).
#[cfg(unix)]
pub(crate) const EXECUTABLE_MODE: u32 = 0o755;

/// Marks the given file as executable for owner, group and others.
#[cfg(unix)]
#[instrument(level = "trace")]
pub(crate) fn mark_executable(path: &Path) -> Result<(), InstallError> {
    use std::fs::{self, Permissions};
    use std::os::unix::fs::PermissionsExt;

    if !path.exists() {
        return Err(InstallError::NotFound(path.display().to_string()));
    }

    fs::set_permissions(path, Permissions::from_mode(EXECUTABLE_MODE)).map_err(InstallError::io(path))
}

/// Marks the given file as executable.
///
/// Windows has no executable bit, so this only verifies that the file is there.
#[cfg(not(unix))]
#[instrument(level = "trace")]
pub(crate) fn mark_executable(path: &Path) -> Result<(), InstallError> {
    if !path.exists() {
        return Err(InstallError::NotFound(path.display().to_string()));
    }

    Ok(())
}

// Name of the extended attribute macOS attaches to downloaded files.
#[cfg(target_os = "macos")]
#[doc(hidden)]
const QUARANTINE_ATTRIBUTE: &str = "com.apple.quarantine";

/// Removes the download-provenance attribute from the given file.
///
/// A missing attribute makes `xattr` fail, so callers should only log the error.
#[cfg(target_os = "macos")]
#[instrument(level = "trace")]
pub(crate) fn clear_provenance(path: &Path) -> Result<(), InstallError> {
    use std::process::{Command, Stdio};

    let output = Command::new("xattr")
        .arg("-d")
        .arg(QUARANTINE_ATTRIBUTE)
        .arg(path)
        .stdin(Stdio::null()) // disconnect from self
        .output()
        .map_err(InstallError::io(path))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = format!("xattr -d {QUARANTINE_ATTRIBUTE} failed ({}): {}", output.status, stderr.trim());
        return Err(InstallError::io(path)(std::io::Error::other(message)));
    }

    Ok(())
}

/// Removes the download-provenance attribute from the given file.
///
/// Only macOS tracks one, so there is nothing to do here.
#[cfg(not(target_os = "macos"))]
pub(crate) fn clear_provenance(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}

/// Marks the given file as executable and clears its provenance attribute.
///
/// Only the first step is required, a failure to clear the attribute is logged and swallowed.
pub(crate) fn make_runnable(path: &Path) -> Result<(), InstallError> {
    mark_executable(path)?;

    if let Err(err) = clear_provenance(path) {
        debug!(%err, path = %path.display(), "failed to clear provenance attribute");
    } else {
        trace!(path = %path.display(), "provenance attribute cleared");
    }

    Ok(())
}
