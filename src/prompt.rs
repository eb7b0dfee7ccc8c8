//! Prompt.
//!
//! This module contains the code to ask the user for the install directory.

use dialoguer::{Confirm, Input};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Asks the user where to install to.
///
/// Uses the terminal if there is one, a native folder picker on macOS otherwise, and falls back
/// to the given default in every other case.
#[instrument(level = "trace")]
pub(crate) fn ask_install_dir(default: &Path) -> PathBuf {
    if io::stdin().is_terminal() {
        return match prompt_install_dir(default) {
            Ok(path) => path,
            Err(err) => {
                warn!(%err, "failed to read install directory, using default");
                default.to_path_buf()
            }
        };
    }

    if let Some(path) = choose_folder() {
        return path;
    }

    debug!("no terminal attached, using default install directory");
    default.to_path_buf()
}

// Asks whether to use the default directory and, if not, for a custom one.
#[doc(hidden)]
fn prompt_install_dir(default: &Path) -> dialoguer::Result<PathBuf> {
    let accepted = Confirm::new() //
        .with_prompt(confirm_prompt(default))
        .default(true)
        .interact()?;
    if accepted {
        return Ok(default.to_path_buf());
    }

    let custom: String = Input::new() //
        .with_prompt("Enter custom install path")
        .allow_empty(true)
        .interact_text()?;

    Ok(custom_install_dir(default, &custom))
}

// The question for the default directory (the `[Y/n]` hint is added by the prompt).
#[doc(hidden)]
fn confirm_prompt(default: &Path) -> String {
    format!("Install app to default location ({})?", default.display())
}

/// Turns the answer for a custom path into the install directory.
///
/// `~` is expanded, an empty answer keeps the default.
pub(crate) fn custom_install_dir(default: &Path, answer: &str) -> PathBuf {
    let answer = answer.trim();
    if answer.is_empty() {
        return default.to_path_buf();
    }

    PathBuf::from(shellexpand::tilde(answer).into_owned())
}

// The AppleScript to show the folder picker.
#[cfg(target_os = "macos")]
#[doc(hidden)]
const CHOOSE_FOLDER_SCRIPT: &str = r#"tell application "System Events"
    activate
    set chosenFolder to choose folder with prompt "Choose install location for the app"
    set posixPath to POSIX path of chosenFolder
end tell
return posixPath"#;

// Shows the native folder picker, `None` if the user cancelled or the picker failed.
#[cfg(target_os = "macos")]
#[doc(hidden)]
fn choose_folder() -> Option<PathBuf> {
    use std::process::{Command, Stdio};

    let output = Command::new("osascript")
        .args(["-e", CHOOSE_FOLDER_SCRIPT])
        .stdin(Stdio::null()) // disconnect from self
        .output();
    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            debug!(status = ?output.status, "folder picker cancelled");
            return None;
        }
        Err(err) => {
            warn!(%err, "failed to show folder picker");
            return None;
        }
    };

    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() { None } else { Some(PathBuf::from(path)) }
}

// There is no folder picker outside of macOS.
#[cfg(not(target_os = "macos"))]
#[doc(hidden)]
fn choose_folder() -> Option<PathBuf> {
    None
}
