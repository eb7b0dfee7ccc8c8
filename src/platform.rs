//! Platform.
//!
//! This module maps the operating system and CPU architecture onto the names used by the release assets.

use crate::archive::ArchiveKind;
use std::env;
use std::fmt;

/// The operating system and CPU architecture the installation is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Platform {
    /// The operating system as in [env::consts::OS].
    pub(crate) os: String,
    /// The CPU architecture as in [env::consts::ARCH].
    pub(crate) arch: String,
}

impl Platform {
    /// Creates a new `Platform`.
    pub(crate) fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self { os: os.into(), arch: arch.into() }
    }

    /// Returns the platform this program runs on.
    pub(crate) fn current() -> Self {
        Self::new(env::consts::OS, env::consts::ARCH)
    }

    /// Whether this is a Windows platform.
    pub(crate) fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Returns the platform label of the release assets (e.g. `mac-arm` or `linux-amd64`).
    ///
    /// Only a few builds are published, unknown platforms get the Apple silicon build.
    pub(crate) fn asset_label(&self) -> &'static str {
        match (self.os.as_str(), self.arch.as_str()) {
            ("macos", "x86_64") => "mac-amd",
            ("macos", _) => "mac-arm",
            ("linux", _) => "linux-amd64",
            ("windows", _) => "windows-amd64",
            _ => "mac-arm",
        }
    }

    /// Returns the archive format the server is released in.
    pub(crate) fn server_archive(&self) -> ArchiveKind {
        if self.is_windows() { ArchiveKind::Zip } else { ArchiveKind::TarGz }
    }

    /// Returns the name of the startup script within the app directory.
    pub(crate) fn startup_script(&self) -> &'static str {
        match self.os.as_str() {
            "windows" => "start.bat",
            "macos" => "start-mac.sh",
            _ => "start.sh",
        }
    }

    /// Returns the names of the MCP tools expected in the MCP archive.
    pub(crate) fn mcp_files(&self) -> [&'static str; 3] {
        if self.is_windows() {
            ["xmlui-mcp.exe", "xmlui-mcp-client.exe", "run-mcp-client.bat"]
        } else {
            ["xmlui-mcp", "xmlui-mcp-client", "run-mcp-client.sh"]
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
