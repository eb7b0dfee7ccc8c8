//! Launch.
//!
//! This module contains the code to run the startup script of the installed app.

use crate::error::InstallError;
use crate::platform::Platform;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{instrument, trace};

/// The startup script of an installed app.
#[derive(Debug)]
pub(crate) struct StartupScript {
    // The directory of the app, also the working directory of the script.
    app_dir: PathBuf,
    // The path to the script.
    script: PathBuf,
    // Whether to run the script through `cmd.exe`.
    batch: bool,
}

impl StartupScript {
    /// Locates the startup script of the given platform within the app directory.
    pub(crate) fn locate(app_dir: &Path, platform: &Platform) -> Result<Self, InstallError> {
        let script = app_dir.join(platform.startup_script());
        if !script.is_file() {
            return Err(InstallError::NotFound(format!("startup script {}", script.display())));
        }

        Ok(Self {
            app_dir: app_dir.to_path_buf(),
            script,
            batch: platform.is_windows(),
        })
    }

    /// Returns the path to the script.
    pub(crate) fn path(&self) -> &Path {
        &self.script
    }

    /// Runs the script with inherited standard streams and waits for it to finish.
    #[instrument(level = "trace")]
    pub(crate) fn run(&self) -> Result<ExitStatus, InstallError> {
        let mut cmd = self.command();
        cmd.current_dir(&self.app_dir);
        cmd.stdin(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        cmd.stdout(Stdio::inherit());

        trace!(?cmd, "running startup script");
        cmd.status().map_err(InstallError::io(&self.script))
    }

    // Builds the command without any I/O configuration.
    #[doc(hidden)]
    fn command(&self) -> Command {
        if self.batch {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.script);
            cmd
        } else {
            Command::new(&self.script)
        }
    }
}

/// Maps the exit status of the script onto the exit code of this program.
///
/// A script killed by a signal has no code and counts as failure.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
