//! Configuration.
//!
//! This module contains the configuration, read from an optional YAML file and falling back to
//! built-in defaults for everything that is not set.

use crate::vars::VarExpander;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::instrument;

/// Name of the default configuration file.
pub(crate) const CONFIG_FILENAME: &str = "xmlui-installer.yml";

/// The struct that holds the configuration loaded from a YAML file.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct Config {
    /// The directory to install into (the user is asked if not set).
    pub(crate) install_root: Option<String>,
    /// Whether to run the startup script at the end.
    pub(crate) launch: bool,
    /// The example application.
    pub(crate) app: AppConfig,
    /// The documentation/component bundle.
    pub(crate) components: ComponentsConfig,
    /// The MCP tools.
    pub(crate) mcp: MaterialConfig,
    /// The test server.
    pub(crate) server: MaterialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_root: None,
            launch: true,
            app: AppConfig::default(),
            components: ComponentsConfig::default(),
            mcp: MaterialConfig {
                source: SourceConfig::new("https://github.com/jonudell/xmlui-mcp/releases/download/v1.0.0/xmlui-mcp-${XI_PLATFORM}.zip"),
            },
            server: MaterialConfig {
                source: SourceConfig::new("https://github.com/JonUdell/xmlui-test-server/releases/download/v1.0.0/xmlui-test-server-${XI_PLATFORM}.${XI_ARCHIVE}"),
            },
        }
    }
}

impl Config {
    /// Loads the configuration from the given filename.
    #[instrument(err, level = "trace")]
    pub(crate) fn load_from_file<P>(filename: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path> + std::fmt::Debug,
    {
        let content = fs::read_to_string(filename)?;

        // an empty file is a valid configuration as well
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&content)?;

        Ok(config)
    }

    /// Expands all variables in the configured values.
    pub(crate) fn expand(mut self, expander: &VarExpander) -> anyhow::Result<Self> {
        if let Some(install_root) = &self.install_root {
            self.install_root = Some(expander.expand(install_root)?.into_owned());
        }
        for source in [&mut self.app.source, &mut self.components.source, &mut self.mcp.source, &mut self.server.source] {
            source.url = expander.expand(&source.url)?.into_owned();
        }

        Ok(self)
    }
}

/// Where to fetch an artifact from.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct SourceConfig {
    /// The URL to download the archive from (may contain variables).
    pub(crate) url: String,
    /// The expected SHA256 of the archive.
    #[serde(default)]
    pub(crate) sha256: Option<String>,
    /// Name of an environment variable holding a bearer token for the download.
    #[serde(default)]
    pub(crate) token_env: Option<String>,
}

impl SourceConfig {
    // Creates a `SourceConfig` for the given URL without checksum or token.
    #[doc(hidden)]
    fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }
}

/// The configuration of the example application.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct AppConfig {
    /// The name of the application (repository), also used as directory name.
    pub(crate) name: String,
    /// Where to fetch the application from.
    pub(crate) source: SourceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "xmlui-invoice".to_string(),
            source: SourceConfig::new("https://codeload.github.com/jonudell/xmlui-invoice/zip/refs/heads/main"),
        }
    }
}

/// The configuration of the documentation/component bundle.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct ComponentsConfig {
    /// Where to fetch the bundle from.
    pub(crate) source: SourceConfig,
    /// The prefix of the root folder within the bundle (`<prefix>-<suffix>`).
    pub(crate) root_prefix: String,
    /// The parts of the bundle to keep.
    pub(crate) slots: Vec<SlotConfig>,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                token_env: Some("PAT_TOKEN".to_string()),
                ..SourceConfig::new("https://api.github.com/repos/xmlui-com/xmlui/zipball/refs/heads/main")
            },
            root_prefix: "xmlui".to_string(),
            slots: vec![
                SlotConfig::new("docs/pages/components", "docs/pages/components"),
                SlotConfig::new("xmlui/src/components", "src/components"),
            ],
        }
    }
}

/// A part of an archive that is moved into the install layout.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct SlotConfig {
    /// The path relative to the root folder of the archive.
    pub(crate) from: String,
    /// The path relative to the install root.
    pub(crate) to: String,
}

impl SlotConfig {
    // Creates a new `SlotConfig`.
    #[doc(hidden)]
    fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

/// The configuration of a binary artifact (MCP tools, test server).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MaterialConfig {
    /// Where to fetch the artifact from.
    pub(crate) source: SourceConfig,
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::platform::Platform;
    use tempfile::tempdir;
    use test_log::test;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.launch);
        assert_eq!(config.install_root, None);
        assert_eq!(config.app.name, "xmlui-invoice");
        assert_eq!(config.components.source.token_env.as_deref(), Some("PAT_TOKEN"));
        assert_eq!(config.components.slots.len(), 2);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = r"
          install-root: /opt/xmlui
          launch: false
          server:
            source:
              url: https://example.com/server.tar.gz
              sha256: abcd
        ";
        let config: Config = serde_yaml::from_str(config).unwrap();
        assert_eq!(config.install_root.as_deref(), Some("/opt/xmlui"));
        assert!(!config.launch);
        assert_eq!(config.server.source.url, "https://example.com/server.tar.gz");
        assert_eq!(config.server.source.sha256.as_deref(), Some("abcd"));
        assert_eq!(config.app.name, "xmlui-invoice");
        assert!(config.mcp.source.url.contains("xmlui-mcp"));
    }

    #[test]
    fn custom_slots() {
        let config = r"
          components:
            root-prefix: docs
            slots:
              - from: docs/pages
                to: mcp/docs
        ";
        let config: Config = serde_yaml::from_str(config).unwrap();
        assert_eq!(config.components.root_prefix, "docs");
        assert_eq!(config.components.slots, vec![SlotConfig::new("docs/pages", "mcp/docs")]);
        assert_eq!(config.components.source.token_env.as_deref(), Some("PAT_TOKEN"));
    }

    #[test]
    fn unknown_field_rejected() {
        let result = serde_yaml::from_str::<Config>("instal-root: /tmp");
        assert!(result.is_err());
    }

    #[test]
    fn load_empty_file() {
        let tempdir = tempdir().unwrap();
        let file = tempdir.path().join(CONFIG_FILENAME);
        fs::write(&file, "\n").unwrap();
        let config = Config::load_from_file(&file).unwrap();
        assert_eq!(config.app.name, "xmlui-invoice");
    }

    #[test]
    fn expand_urls() {
        let expander = VarExpander::for_platform(&Platform::new("linux", "x86_64"));
        let config = Config::default().expand(&expander).unwrap();
        assert_eq!(config.mcp.source.url, "https://github.com/jonudell/xmlui-mcp/releases/download/v1.0.0/xmlui-mcp-linux-amd64.zip");
        assert_eq!(
            config.server.source.url,
            "https://github.com/JonUdell/xmlui-test-server/releases/download/v1.0.0/xmlui-test-server-linux-amd64.tar.gz"
        );
    }

    #[test]
    fn expand_unknown_variable() {
        let expander = VarExpander::for_platform(&Platform::new("linux", "x86_64"));
        let config = Config {
            install_root: Some("${XI_UNKNOWN}/x".to_string()),
            ..Default::default()
        };
        assert!(config.expand(&expander).is_err());
    }
}
