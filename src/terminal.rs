//! Terminal.
//!
//! This module contains terminal related things.

use std::io::Write;

// https://learn.microsoft.com/en-us/windows/console/console-virtual-terminal-sequences
#[doc(hidden)]
pub(crate) fn set_window_title(title: &str) {
    print!("\x1b]0;{title}\x1b\\");
    let _ = std::io::stdout().flush();
}

// https://github.com/rust-lang/cargo/blob/cbd05082547daf4f10044bb2fc8a8eb8696a05d8/src/cargo/util/progress.rs#L163
#[doc(hidden)]
pub(crate) fn set_progress(progress: Option<usize>) {
    print!("{}", progress_sequence(progress));
    let _ = std::io::stdout().flush();
}

// Builds the escape sequence for the taskbar progress (`None` removes it).
#[doc(hidden)]
fn progress_sequence(progress: Option<usize>) -> String {
    let (state, progress) = match progress {
        Some(progress) => (1, progress.min(100)),
        None => (0, 0),
    };
    format!("\x1b]9;4;{state};{progress}\x1b\\")
}
