mod archive;
mod args;
mod checksum;
mod colors;
mod config;
mod download;
mod error;
mod installer;
mod launch;
mod layout;
mod permissions;
mod platform;
mod prompt;
mod terminal;
mod vars;
mod version;

use crate::args::Args;
use crate::colors::*;
use crate::config::*;
use crate::download::Downloader;
use crate::installer::Installer;
use crate::platform::Platform;
use crate::vars::VarExpander;
use crate::version::Version;
use anyhow::{Context, bail};
use clap::Parser;
use std::path::{self, Path, PathBuf};
use std::time::{Duration, Instant};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{level_filters::*, *};
use tracing_subscriber::EnvFilter;

// Exit code used in case there were no errors.
#[doc(hidden)]
const EXIT_OK: i32 = 0;

// Exit code used in case of errors.
#[doc(hidden)]
const EXIT_NOK: i32 = 1;

/// Main entry point for the application.
fn main() {
    // enable ansi support to use colorised/styled output
    #[cfg(windows)]
    let _ = nu_ansi_term::enable_ansi_support();

    // delegate
    match internal_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            println!("{}", ATTENTION_COLOR.paint(format!("Failed! {err:#}")));
            std::process::exit(EXIT_NOK);
        }
    }
}

// Internal main entry point for the application.
//
// Returns the exit code, which is the one of the startup script if it was launched.
#[doc(hidden)]
fn internal_main() -> anyhow::Result<i32> {
    // remember start date/time
    let start = Instant::now();

    // parse arguments
    let args = Args::parse();

    // print some information
    if !args.quiet || args.version {
        print_info();
    }

    // stop here in case only the version was requested
    if args.version {
        return Ok(EXIT_OK);
    }

    // init tracing
    init_tracing(&args);

    // print parsed arguments
    trace!("arguments: {args:#?}");

    // load config
    let platform = Platform::current();
    debug!(%platform);
    let config = load_config(&args)?;
    let config = config.expand(&VarExpander::for_platform(&platform)).context("failed to expand configuration")?;
    debug!(?config);

    // determine install root
    let install_root = install_root(&args, &config)?;
    println!("Installing to {}", PATH_COLOR.paint(install_root.to_string_lossy()));

    // install
    let launch = config.launch && !args.no_launch;
    let downloader = Downloader::new()?;
    let mut installer = Installer::new(config, platform, &install_root);
    installer.launch(launch);
    let outcome = installer.run(&downloader)?;
    debug!(app_dir = %outcome.app_dir.display(), status = ?outcome.status);

    // print some statistics
    let elapsed = start.elapsed();
    println!("Total time: {}", format_elapsed(elapsed));
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    println!("Finished at: {}", format_now(now));

    Ok(outcome.exit_code())
}

// Loads the configuration given on the command line, the one in the working directory or the built-in one.
#[doc(hidden)]
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let (config_path, explicit) = match &args.config {
        Some(config) => (PathBuf::from(config), true),
        None => (PathBuf::from(CONFIG_FILENAME), false),
    };
    let config_path = path::absolute(&config_path).unwrap_or(config_path);

    if !config_path.is_file() {
        if explicit {
            bail!("configuration {} does not exist", config_path.display());
        }
        debug!("no configuration file, using defaults");
        return Ok(Config::default());
    }

    println!("Using configuration from {}.", PATH_COLOR.paint(config_path.to_string_lossy()));
    Config::load_from_file(&config_path).with_context(|| format!("failed to load {}", config_path.display()))
}

// Determines the install root: command line, configuration, default or asking the user (in that order).
#[doc(hidden)]
fn install_root(args: &Args, config: &Config) -> anyhow::Result<PathBuf> {
    let install_root = if let Some(dir) = &args.dir {
        PathBuf::from(shellexpand::tilde(dir).into_owned())
    } else if let Some(dir) = &config.install_root {
        PathBuf::from(dir)
    } else {
        let default = default_install_root(&config.app.name);
        if args.yes { default } else { prompt::ask_install_dir(&default) }
    };

    let install_root = path::absolute(&install_root).with_context(|| format!("invalid install directory {}", install_root.display()))?;
    Ok(install_root)
}

// Returns the default install root, a directory named after the app in the home directory.
#[doc(hidden)]
fn default_install_root(app_name: &str) -> PathBuf {
    let base = dirs::home_dir().unwrap_or_else(|| Path::new(".").to_path_buf());
    base.join(app_name)
}

// Formats the elapsed time with second precision.
#[doc(hidden)]
fn format_elapsed(elapsed: Duration) -> String {
    // null out everything below seconds
    let elapsed = Duration::from_secs(elapsed.as_secs());

    humantime::format_duration(elapsed).to_string()
}

// Formats the given date/time in the local offset.
#[doc(hidden)]
fn format_now(now: OffsetDateTime) -> String {
    const FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]");

    // local offset or UTC
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    trace!(?offset);

    let now = now.to_offset(offset);
    now.format(&FORMAT).unwrap_or(now.to_string())
}

// Prints some information (version, path of executable, etc.).
#[doc(hidden)]
fn print_info() {
    let version = Version::default();
    if let Ok(exe) = std::env::current_exe() {
        let exe = PATH_COLOR.paint(exe.to_string_lossy());
        println!("{version} [{exe}]");
    } else {
        println!("{version}");
    }
}

// Initialises the tracing framework based on given command line arguments.
#[doc(hidden)]
fn init_tracing(args: &Args) {
    let level_filter = match args.verbose {
        0 => LevelFilter::ERROR.into(),
        1 => LevelFilter::WARN.into(),
        2 => LevelFilter::INFO.into(),
        3 => LevelFilter::DEBUG.into(),
        _ => LevelFilter::TRACE.into(),
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level_filter);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use test_log::test;

    #[test]
    fn elapsed_without_fraction() {
        assert_eq!(format_elapsed(Duration::from_millis(61_900)), "1m 1s");
    }

    #[test]
    fn default_root_named_after_app() {
        assert!(default_install_root("xmlui-invoice").ends_with("xmlui-invoice"));
    }

    #[test]
    fn install_root_from_args_wins() {
        let args = Args::try_parse_from(["program", "-d", "/opt/xmlui"]).unwrap();
        let config = Config {
            install_root: Some("/srv/xmlui".to_string()),
            ..Default::default()
        };
        assert_eq!(install_root(&args, &config).unwrap(), path::absolute("/opt/xmlui").unwrap());
    }

    #[test]
    fn install_root_from_config() {
        let args = Args::try_parse_from(["program"]).unwrap();
        let config = Config {
            install_root: Some("/srv/xmlui".to_string()),
            ..Default::default()
        };
        assert_eq!(install_root(&args, &config).unwrap(), path::absolute("/srv/xmlui").unwrap());
    }

    #[test]
    fn install_root_default_with_yes() {
        let args = Args::try_parse_from(["program", "-y"]).unwrap();
        let root = install_root(&args, &Config::default()).unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("xmlui-invoice"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let tempdir = tempdir().unwrap();
        let missing = tempdir.path().join("missing.yml");
        let args = Args::try_parse_from(["program", "-c", missing.to_str().unwrap()]).unwrap();
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let tempdir = tempdir().unwrap();
        let file = tempdir.path().join("custom.yml");
        fs::write(&file, "launch: false\n").unwrap();
        let args = Args::try_parse_from(["program", "-c", file.to_str().unwrap()]).unwrap();
        let config = load_config(&args).unwrap();
        assert!(!config.launch);
    }
}
