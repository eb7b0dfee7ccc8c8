//! Installer.
//!
//! This module contains the installation pipeline: fetch all artifacts, extract them into a staging
//! directory, organize them into the install layout and finally launch the app.

use crate::archive::{self, ArchiveKind};
use crate::colors::*;
use crate::config::{Config, SlotConfig, SourceConfig};
use crate::download::Fetch;
use crate::error::InstallError;
use crate::launch::{self, StartupScript};
use crate::layout::{self, MCP_SLOT, Relocation};
use crate::permissions;
use crate::platform::Platform;
use crate::terminal::*;
use anyhow::{Context, anyhow};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tempfile::TempDir;
use tracing::{debug, instrument, trace, warn};

/// Prefix of the staging directory created within the install root.
pub(crate) const STAGING_PREFIX: &str = ".xmlui-staging-";

/// The stages of an installation run, strictly in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Stage {
    /// Not started yet.
    Pending,
    /// Downloading all artifacts.
    Fetching,
    /// Unpacking all artifacts into the staging directory.
    Extracting,
    /// Moving the unpacked artifacts into the install layout.
    Organizing,
    /// Running the startup script.
    Launching,
    /// Finished.
    Done,
}

impl Stage {
    /// Number of stages shown to the user.
    pub(crate) const COUNT: usize = 5;

    /// Returns the (1-based) step number shown to the user.
    pub(crate) fn step(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Organizing => "organizing",
            Self::Launching => "launching",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// The artifacts that make up an installation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Artifact {
    /// The example application.
    App,
    /// The documentation/component bundle.
    Components,
    /// The MCP tools.
    Mcp,
    /// The test server.
    Server,
}

impl Artifact {
    /// All artifacts in processing order.
    pub(crate) const ALL: [Artifact; 4] = [Self::App, Self::Components, Self::Mcp, Self::Server];

    /// Returns the id, also used as name of the staging subdirectory.
    pub(crate) fn id(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Components => "components",
            Self::Mcp => "mcp",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Self::App => "XMLUI app",
            Self::Components => "XMLUI components",
            Self::Mcp => "MCP tools",
            Self::Server => "test server",
        };
        write!(f, "{description}")
    }
}

/// The result of a successful installation.
#[derive(Debug)]
pub(crate) struct Outcome {
    /// The directory of the installed app.
    pub(crate) app_dir: PathBuf,
    /// The exit status of the startup script, if it was launched.
    pub(crate) status: Option<ExitStatus>,
}

impl Outcome {
    /// Returns the exit code for this program.
    pub(crate) fn exit_code(&self) -> i32 {
        self.status.map_or(0, launch::exit_code)
    }
}

/// The installation contains everything to materialise the app and its tooling to disc.
#[derive(Debug)]
pub(crate) struct Installer {
    config: Config,
    install_root: PathBuf,
    launch: bool,
    platform: Platform,
    stage: Stage,
}

impl Installer {
    /// Creates a new `Installer` for the given (already expanded) configuration.
    pub(crate) fn new(config: Config, platform: Platform, install_root: impl Into<PathBuf>) -> Self {
        Self {
            launch: config.launch,
            config,
            install_root: install_root.into(),
            platform,
            stage: Stage::Pending,
        }
    }

    /// Whether to run the startup script at the end.
    pub(crate) fn launch(&mut self, launch: bool) -> &mut Self {
        self.launch = launch;

        self
    }

    /// Returns the current stage.
    #[cfg(test)]
    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs the whole installation.
    #[instrument(level = "trace", skip(self, fetcher), fields(install_root = %self.install_root.display()))]
    pub(crate) fn run(&mut self, fetcher: &dyn Fetch) -> anyhow::Result<Outcome> {
        fs::create_dir_all(&self.install_root).map_err(InstallError::io(&self.install_root))?;

        self.enter(Stage::Fetching)?;
        let downloads = self.fetch_all(fetcher)?;

        self.enter(Stage::Extracting)?;
        let staging = Staging::create(&self.install_root)?;
        let server_file = self.extract_all(&staging, downloads)?;

        self.enter(Stage::Organizing)?;
        let app_dir = self.organize(&staging, server_file)?;
        staging.close();
        println!("{} Install location: {}", SUCCESS_COLOR.paint("✓"), PATH_COLOR.paint(self.install_root.to_string_lossy()));

        let status = if self.launch {
            self.enter(Stage::Launching)?;
            Some(self.launch_app(&app_dir)?)
        } else {
            debug!("launch disabled");
            None
        };

        self.enter(Stage::Done)?;
        set_progress(None);

        Ok(Outcome { app_dir, status })
    }

    // Moves on to the given stage, refusing to go back or to stay.
    fn enter(&mut self, stage: Stage) -> anyhow::Result<()> {
        if stage <= self.stage {
            return Err(anyhow!("cannot go from stage '{}' to stage '{stage}'", self.stage));
        }
        trace!(from = %self.stage, to = %stage, "entering stage");
        self.stage = stage;

        let step = stage.step();
        let total = Stage::COUNT;
        let header = format!("Step {step}/{total}: {}", capitalize(&stage.to_string()));
        println!("{}", INFO_COLOR.paint(&header));
        set_window_title(&format!("{} - {header}", env!("CARGO_PKG_NAME")));
        set_progress(Some(step * 100 / total));

        Ok(())
    }

    // Returns the source of the given artifact.
    fn source(&self, artifact: Artifact) -> &SourceConfig {
        match artifact {
            Artifact::App => &self.config.app.source,
            Artifact::Components => &self.config.components.source,
            Artifact::Mcp => &self.config.mcp.source,
            Artifact::Server => &self.config.server.source,
        }
    }

    // Downloads all artifacts.
    #[instrument(level = "trace", skip(self, fetcher))]
    fn fetch_all(&self, fetcher: &dyn Fetch) -> anyhow::Result<Vec<(Artifact, Vec<u8>)>> {
        let mut downloads = Vec::with_capacity(Artifact::ALL.len());
        for artifact in Artifact::ALL {
            let source = self.source(artifact);
            println!("Downloading {artifact}...");
            println!("  From: {}", PATH_COLOR.paint(&source.url));

            let bytes = fetcher.fetch(source).with_context(|| format!("failed to download {artifact}"))?;
            println!("  Downloaded: {} bytes", bytes.len());
            downloads.push((artifact, bytes));
        }

        Ok(downloads)
    }

    // Unpacks all artifacts into their staging subdirectory.
    //
    // Returns the last file of the server archive.
    #[instrument(level = "trace", skip(self, staging, downloads))]
    fn extract_all(&self, staging: &Staging, downloads: Vec<(Artifact, Vec<u8>)>) -> anyhow::Result<Option<PathBuf>> {
        let mut server_file = None;
        for (artifact, bytes) in downloads {
            let kind = ArchiveKind::from_url(&self.source(artifact).url);
            let dest = staging.path(artifact);

            let last_file = archive::extract(kind, &bytes, &dest).with_context(|| format!("failed to extract {artifact}"))?;
            println!("  Extracted {artifact} ({kind})");

            if artifact == Artifact::Server {
                server_file = last_file;
            }
        }

        Ok(server_file)
    }

    // Moves everything from the staging directory into the install layout.
    //
    // Returns the app directory.
    #[instrument(level = "trace", skip(self, staging))]
    fn organize(&self, staging: &Staging, server_file: Option<PathBuf>) -> anyhow::Result<PathBuf> {
        let app_name = &self.config.app.name;
        let app_dir = layout::relocate_branch_dir(&staging.path(Artifact::App), app_name, &self.install_root) //
            .context("failed to organize app directory")?;
        println!("  Organized {} into {}", Artifact::App, PATH_COLOR.paint(app_dir.to_string_lossy()));

        self.organize_components(&staging.path(Artifact::Components))?;
        self.organize_mcp(&staging.path(Artifact::Mcp));
        self.organize_server(&staging.path(Artifact::Server), &app_dir, server_file)?;

        // the script of the app repository usually lacks the executable bit
        let script = app_dir.join(self.platform.startup_script());
        if script.exists() {
            make_runnable_best_effort(&script);
        }

        Ok(app_dir)
    }

    // Moves the configured parts of the component bundle into their slots.
    fn organize_components(&self, extracted: &Path) -> anyhow::Result<()> {
        let components = &self.config.components;
        let root = layout::find_branch_dir(extracted, &components.root_prefix) //
            .with_context(|| format!("failed to organize {}", Artifact::Components))?;

        for slot in &components.slots {
            match self.relocate_slot(&root, slot) {
                Ok(Relocation::Moved(to)) => println!("  Moved {} to {}", slot.from, PATH_COLOR.paint(to.to_string_lossy())),
                Ok(Relocation::Skipped) => println!("  Skipping {} (not found)", slot.from),
                Err(err) => {
                    warn!(%err, from = %slot.from, to = %slot.to, "failed to relocate slot");
                    println!("  Skipping {} ({})", slot.from, ATTENTION_COLOR.paint(err.to_string()));
                }
            }
        }

        Ok(())
    }

    // Moves one part of the component bundle into its slot.
    fn relocate_slot(&self, root: &Path, slot: &SlotConfig) -> Result<Relocation, InstallError> {
        let from = archive::safe_join(root, Path::new(&slot.from))?;
        let to = archive::safe_join(&self.install_root, Path::new(&slot.to))?;
        let (Some(slot_dir), Some(name)) = (to.parent(), to.file_name()) else {
            return Err(InstallError::UnsafePath(slot.to.clone()));
        };
        if to == self.install_root {
            return Err(InstallError::UnsafePath(slot.to.clone()));
        }

        layout::relocate_into_slot(&from, slot_dir, &name.to_string_lossy())
    }

    // Moves the MCP tools into their slot, missing tools are skipped.
    fn organize_mcp(&self, extracted: &Path) {
        let mcp_dir = self.install_root.join(MCP_SLOT);
        for name in self.platform.mcp_files() {
            match layout::relocate_into_slot(&extracted.join(name), &mcp_dir, name) {
                Ok(Relocation::Moved(to)) => {
                    println!("  Moved {name} to {}", PATH_COLOR.paint(to.to_string_lossy()));
                    if !name.ends_with(".exe") {
                        make_runnable_best_effort(&to);
                    }
                }
                Ok(Relocation::Skipped) => println!("  Skipping {name} (not found)"),
                Err(err) => {
                    warn!(%err, name, "failed to relocate MCP tool");
                    println!("  Skipping {name} ({})", ATTENTION_COLOR.paint(err.to_string()));
                }
            }
        }
    }

    // Merges the test server into the app directory, server files win.
    fn organize_server(&self, extracted: &Path, app_dir: &Path, server_file: Option<PathBuf>) -> anyhow::Result<()> {
        layout::merge_into(extracted, app_dir).with_context(|| format!("failed to organize {}", Artifact::Server))?;

        // the last file of the archive is taken for the server binary
        if let Some(file) = server_file {
            let file = file.strip_prefix(extracted).map(|relative| app_dir.join(relative))?;
            println!("  Server binary: {}", PATH_COLOR.paint(file.to_string_lossy()));
            make_runnable_best_effort(&file);
        }

        Ok(())
    }

    // Runs the startup script of the app.
    fn launch_app(&self, app_dir: &Path) -> anyhow::Result<ExitStatus> {
        let script = StartupScript::locate(app_dir, &self.platform).context("failed to launch app")?;
        println!("Launching {}", PATH_COLOR.paint(script.path().to_string_lossy()));

        let status = script.run().context("failed to launch app")?;
        if !status.success() {
            println!("{}", ATTENTION_COLOR.paint(format!("Startup script exited with {status}")));
        }

        Ok(status)
    }
}

// Makes the given file runnable, failures are only reported.
#[doc(hidden)]
fn make_runnable_best_effort(path: &Path) {
    if let Err(err) = permissions::make_runnable(path) {
        warn!(%err, path = %path.display(), "failed to make file runnable");
    }
}

// Uppercases the first character.
#[doc(hidden)]
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The directory within the install root that holds the unpacked artifacts until they are organized.
///
/// The directory is removed when dropped, so it does not outlive a failed run either.
#[derive(Debug)]
pub(crate) struct Staging {
    dir: TempDir,
}

impl Staging {
    /// Creates a new staging directory within the given directory.
    pub(crate) fn create(parent: &Path) -> Result<Self, InstallError> {
        let dir = tempfile::Builder::new() //
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(InstallError::io(parent))?;
        trace!(staging = %dir.path().display());

        Ok(Self { dir })
    }

    /// Returns the directory for the given artifact.
    pub(crate) fn path(&self, artifact: Artifact) -> PathBuf {
        self.dir.path().join(artifact.id())
    }

    /// Removes the staging directory, failures are only reported.
    pub(crate) fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            warn!(?err, path = %path.display(), "failed to delete staging directory");
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::archive::tests::{tar_gz_fixture, zip_fixture};
    use std::collections::HashMap;
    use tempfile::tempdir;
    use test_log::test;

    // Serves fixtures instead of downloading.
    struct FakeFetch {
        responses: HashMap<String, Vec<u8>>,
    }

    impl Fetch for FakeFetch {
        fn fetch(&self, source: &SourceConfig) -> Result<Vec<u8>, InstallError> {
            self.responses.get(&source.url).cloned().ok_or_else(|| InstallError::NetworkFailure {
                url: source.url.clone(),
                reason: "request failed: 404 Not Found".to_string(),
            })
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.app.source.url = "test://app".to_string();
        config.components.source.url = "test://components".to_string();
        config.mcp.source.url = "test://mcp.zip".to_string();
        config.server.source.url = "test://server.tar.gz".to_string();
        config
    }

    fn fake_fetch(mcp: &[(&str, &[u8])]) -> FakeFetch {
        let mut responses = HashMap::new();
        responses.insert(
            "test://app".to_string(),
            zip_fixture(&[
                ("xmlui-invoice-main/", b""),
                ("xmlui-invoice-main/index.html", b"<App/>"),
                ("xmlui-invoice-main/start.sh", b"#!/bin/sh\nexit 0\n"),
            ]),
        );
        responses.insert(
            "test://components".to_string(),
            zip_fixture(&[
                ("xmlui-com-xmlui-0123abc/docs/pages/components/Button.md", b"# Button"),
                ("xmlui-com-xmlui-0123abc/xmlui/src/components/Button.tsx", b"export {}"),
                ("xmlui-com-xmlui-0123abc/README.md", b"readme"),
            ]),
        );
        responses.insert("test://mcp.zip".to_string(), zip_fixture(mcp));
        responses.insert("test://server.tar.gz".to_string(), tar_gz_fixture(&[("xmlui-test-server", b"server")]));
        FakeFetch { responses }
    }

    fn all_mcp_files() -> Vec<(&'static str, &'static [u8])> {
        vec![("xmlui-mcp", b"mcp"), ("xmlui-mcp-client", b"client"), ("run-mcp-client.sh", b"#!/bin/sh\n")]
    }

    fn linux() -> Platform {
        Platform::new("linux", "x86_64")
    }

    #[test]
    fn stage_steps() {
        assert_eq!(Stage::Fetching.step(), 1);
        assert_eq!(Stage::Done.step(), Stage::COUNT);
    }

    #[test]
    fn stages_only_move_forward() {
        let tempdir = tempdir().unwrap();
        let mut installer = Installer::new(config(), linux(), tempdir.path());
        installer.enter(Stage::Fetching).unwrap();
        installer.enter(Stage::Organizing).unwrap();
        assert!(installer.enter(Stage::Extracting).is_err());
        assert!(installer.enter(Stage::Organizing).is_err());
        assert_eq!(installer.stage(), Stage::Organizing);
    }

    #[test]
    fn install_layout() {
        let tempdir = tempdir().unwrap();
        let root = tempdir.path().join("install");
        let mut installer = Installer::new(config(), linux(), &root);
        installer.launch(false);

        let outcome = installer.run(&fake_fetch(&all_mcp_files())).unwrap();

        assert_eq!(outcome.app_dir, root.join("xmlui-invoice"));
        assert!(outcome.status.is_none());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(installer.stage(), Stage::Done);

        assert_eq!(fs::read(root.join("xmlui-invoice/index.html")).unwrap(), b"<App/>");
        assert_eq!(fs::read(root.join("xmlui-invoice/xmlui-test-server")).unwrap(), b"server");
        assert_eq!(fs::read(root.join("docs/pages/components/Button.md")).unwrap(), b"# Button");
        assert_eq!(fs::read(root.join("src/components/Button.tsx")).unwrap(), b"export {}");
        for name in ["xmlui-mcp", "xmlui-mcp-client", "run-mcp-client.sh"] {
            assert!(root.join(MCP_SLOT).join(name).is_file(), "{name}");
        }

        // no leftovers from staging
        let mut names: Vec<String> = fs::read_dir(&root).unwrap().map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned()).collect();
        names.sort();
        assert_eq!(names, vec!["docs", "mcp", "src", "xmlui-invoice"]);
    }

    #[cfg(unix)]
    #[test]
    fn install_layout_executables() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = tempdir().unwrap();
        let mut installer = Installer::new(config(), linux(), tempdir.path());
        installer.launch(false);

        installer.run(&fake_fetch(&all_mcp_files())).unwrap();

        let mode = |path: PathBuf| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(tempdir.path().join("xmlui-invoice/start.sh")), permissions::EXECUTABLE_MODE);
        assert_eq!(mode(tempdir.path().join("xmlui-invoice/xmlui-test-server")), permissions::EXECUTABLE_MODE);
        assert_eq!(mode(tempdir.path().join("mcp/xmlui-mcp")), permissions::EXECUTABLE_MODE);
    }

    #[test]
    fn server_merges_into_app_directory() {
        let tempdir = tempdir().unwrap();
        let mut fetch = fake_fetch(&all_mcp_files());
        fetch.responses.insert(
            "test://app".to_string(),
            zip_fixture(&[
                ("xmlui-invoice-main/resources/app.css", b"css"),
                ("xmlui-invoice-main/start.sh", b"#!/bin/sh\nexit 0\n"),
            ]),
        );
        fetch.responses.insert(
            "test://server.tar.gz".to_string(),
            tar_gz_fixture(&[("resources/", b""), ("resources/server.dat", b"data"), ("xmlui-test-server", b"server")]),
        );
        let mut installer = Installer::new(config(), linux(), tempdir.path());
        installer.launch(false);

        installer.run(&fetch).unwrap();

        let app_dir = tempdir.path().join("xmlui-invoice");
        assert_eq!(fs::read(app_dir.join("resources/app.css")).unwrap(), b"css");
        assert_eq!(fs::read(app_dir.join("resources/server.dat")).unwrap(), b"data");
        assert_eq!(fs::read(app_dir.join("xmlui-test-server")).unwrap(), b"server");
    }

    #[test]
    fn missing_mcp_tools_are_skipped() {
        let tempdir = tempdir().unwrap();
        let mut installer = Installer::new(config(), linux(), tempdir.path());
        installer.launch(false);

        installer.run(&fake_fetch(&[("xmlui-mcp", b"mcp")])).unwrap();

        assert!(tempdir.path().join("mcp/xmlui-mcp").is_file());
        assert!(!tempdir.path().join("mcp/xmlui-mcp-client").exists());
    }

    #[test]
    fn failed_download_names_artifact() {
        let tempdir = tempdir().unwrap();
        let mut fetch = fake_fetch(&all_mcp_files());
        fetch.responses.remove("test://server.tar.gz");
        let mut installer = Installer::new(config(), linux(), tempdir.path());

        let err = installer.run(&fetch).unwrap_err();

        assert_eq!(err.to_string(), "failed to download test server");
        assert!(matches!(err.downcast_ref::<InstallError>(), Some(InstallError::NetworkFailure { .. })));
        assert_eq!(installer.stage(), Stage::Fetching);
        // nothing extracted before everything is fetched
        assert_eq!(fs::read_dir(tempdir.path()).unwrap().count(), 0);
    }

    #[test]
    fn malformed_archive_cleans_up_staging() {
        let tempdir = tempdir().unwrap();
        let mut fetch = fake_fetch(&all_mcp_files());
        fetch.responses.insert("test://mcp.zip".to_string(), b"no zip".to_vec());
        let mut installer = Installer::new(config(), linux(), tempdir.path());

        let err = installer.run(&fetch).unwrap_err();

        assert_eq!(err.to_string(), "failed to extract MCP tools");
        assert!(matches!(err.downcast_ref::<InstallError>(), Some(InstallError::MalformedArchive(_))));
        assert_eq!(fs::read_dir(tempdir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_app_directory() {
        let tempdir = tempdir().unwrap();
        let mut config = config();
        config.app.name = "other-app".to_string();
        let mut installer = Installer::new(config, linux(), tempdir.path());

        let err = installer.run(&fake_fetch(&all_mcp_files())).unwrap_err();

        assert_eq!(err.to_string(), "failed to organize app directory");
        assert!(matches!(err.downcast_ref::<InstallError>(), Some(InstallError::NotFound(_))));
    }

    #[test]
    fn slot_escaping_install_root_is_skipped() {
        let tempdir = tempdir().unwrap();
        let mut config = config();
        config.components.slots = vec![SlotConfig {
            from: "README.md".to_string(),
            to: "../outside.md".to_string(),
        }];
        let root = tempdir.path().join("install");
        let mut installer = Installer::new(config, linux(), &root);
        installer.launch(false);

        installer.run(&fake_fetch(&all_mcp_files())).unwrap();

        assert!(!tempdir.path().join("outside.md").exists());
    }

    #[cfg(unix)]
    #[test]
    fn launch_runs_startup_script() {
        let tempdir = tempdir().unwrap();
        let mut installer = Installer::new(config(), linux(), tempdir.path());

        let outcome = installer.run(&fake_fetch(&all_mcp_files())).unwrap();

        assert!(outcome.status.is_some_and(|status| status.success()));
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn launch_without_startup_script() {
        let tempdir = tempdir().unwrap();
        let mut installer = Installer::new(config(), Platform::new("macos", "aarch64"), tempdir.path());

        let err = installer.run(&fake_fetch(&all_mcp_files())).unwrap_err();

        assert_eq!(err.to_string(), "failed to launch app");
        assert!(matches!(err.downcast_ref::<InstallError>(), Some(InstallError::NotFound(_))));
        assert_eq!(installer.stage(), Stage::Launching);
    }

    #[test]
    fn capitalize_words() {
        assert_eq!(capitalize("fetching"), "Fetching");
        assert_eq!(capitalize(""), "");
    }
}
