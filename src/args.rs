//! Arguments.
//!
//! This module contains the definition for the available command-line parameter.

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(author)]
pub(crate) struct Args {
    /// Sets a custom config file
    #[clap(short, long, value_name = "file")]
    pub(crate) config: Option<String>,
    /// Sets the install directory (no questions asked)
    #[clap(short, long, value_name = "dir")]
    pub(crate) dir: Option<String>,
    /// Do not run the startup script after the installation
    #[clap(long, action)]
    pub(crate) no_launch: bool,
    /// Suppress unnecessary information
    #[clap(short = 'q', long, action)]
    pub(crate) quiet: bool,
    /// Change level of verbosity (apply multiple times to increase level)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
    /// Print version information
    #[clap(short = 'V', long, action)]
    pub(crate) version: bool,
    /// Install to the default directory without asking
    #[clap(short = 'y', long, action, conflicts_with = "dir")]
    pub(crate) yes: bool,
}
