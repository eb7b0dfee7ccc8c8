//! Version.
//!
//! This module contains the version information printed in the banner.

use crate::platform::Platform;
use std::fmt;

/// Structure to hold the version information.
#[derive(Debug)]
pub(crate) struct Version {
    /// The name of the package.
    pub(crate) pkg_name: &'static str,
    /// The version of the package.
    pub(crate) pkg_version: &'static str,
    /// The value that `git describe` returned.
    pub(crate) git_describe: &'static str,
    /// The version of the rust compiler.
    pub(crate) rustc_semver: &'static str,
    /// The platform the installer runs on.
    pub(crate) platform: Platform,
}

impl Default for Version {
    fn default() -> Self {
        Self {
            pkg_name: env!("CARGO_PKG_NAME"),
            pkg_version: env!("CARGO_PKG_VERSION"),
            git_describe: env!("VERGEN_GIT_DESCRIBE"),
            rustc_semver: env!("VERGEN_RUSTC_SEMVER"),
            platform: Platform::current(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            pkg_name,
            pkg_version,
            git_describe,
            rustc_semver,
            platform,
        } = self;
        write!(f, "{pkg_name} {pkg_version} (git/{git_describe}) (rustc/{rustc_semver}) [{platform}]")
    }
}
