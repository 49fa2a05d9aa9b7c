//! Contains the system configuration.
//!
//! The configuration is loaded from **config/settings.yml**. Every setting has a sensible
//! default, therefore a missing file is fine and simply yields the defaults. A file which
//! cannot be parsed however is reported as error, as silently ignoring it would most probably
//! process the wrong saves.
//!
//! # Example
//! ```
//! # use xsave::config::Config;
//! let config = Config::load_from_string("
//! storage:
//!     folder: '/data/storage'
//! extraction:
//!     keepFragments: false
//!     autoCache: ['ships', 'log.trade']
//! ").unwrap();
//!
//! assert_eq!(config.storage_folder().to_string_lossy(), "/data/storage");
//! assert_eq!(config.saves_folder().to_string_lossy(), "saves");
//!
//! let settings = config.extraction_settings();
//! assert!(!settings.keep_fragments);
//! assert_eq!(settings.auto_cache, vec!["ships", "log.trade"]);
//!
//! // Values can also be accessed directly...
//! assert_eq!(config.query("extraction.autoCache").as_vec().unwrap().len(), 2);
//! assert!(config.query("unknown.path").is_badvalue());
//! ```
use crate::extraction::ExtractionSettings;
use anyhow::Context;
use simplelog::LevelFilter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use yaml_rust::{Yaml, YamlLoader};

/// Contains the location of the settings file, relative to the working directory.
pub const SETTINGS_FILE: &str = "config/settings.yml";

/// Lists the commands which are cached after an extraction unless configured otherwise.
pub const DEFAULT_AUTO_CACHE: [&str; 3] = ["ships", "stations", "event-log"];

/// Provides access to the system configuration.
#[derive(Debug, Clone)]
pub struct Config {
    doc: Yaml,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            doc: Yaml::Hash(Default::default()),
        }
    }
}

impl Config {
    /// Loads the configuration from the given file.
    ///
    /// If the file doesn't exist, the defaults are used.
    pub fn load(file: impl AsRef<Path>) -> anyhow::Result<Config> {
        let file = file.as_ref();
        if !file.is_file() {
            log::info!(
                "Config file {} doesn't exist - using the defaults...",
                file.display()
            );
            return Ok(Config::default());
        }

        log::info!("Loading config file {}...", file.display());
        let data = std::fs::read_to_string(file)
            .with_context(|| format!("Cannot load config file {}", file.display()))?;
        Config::load_from_string(&data)
            .with_context(|| format!("Cannot parse config file {}", file.display()))
    }

    /// Loads a configuration from the given string instead of a file.
    ///
    /// This is intended to be used in test environments where we cannot / do not want to load
    /// a config file from disk.
    pub fn load_from_string(data: &str) -> anyhow::Result<Config> {
        let docs = YamlLoader::load_from_str(data)
            .map_err(|error| anyhow::anyhow!("Cannot parse config data: {}", error))?;

        match docs.into_iter().next() {
            Some(doc @ Yaml::Hash(_)) => Ok(Config { doc }),
            None | Some(Yaml::Null) => Ok(Config::default()),
            Some(_) => Err(anyhow::anyhow!(
                "The config has to be a map of settings"
            )),
        }
    }

    /// Reads the value at the given dotted path like `storage.folder`.
    ///
    /// Returns **Yaml::BadValue** if there is no such value.
    pub fn query(&self, path: &str) -> &Yaml {
        path.split('.')
            .fold(&self.doc, |current, key| &current[key])
    }

    fn string_or(&self, path: &str, default: &str) -> String {
        self.query(path)
            .as_str()
            .unwrap_or(default)
            .to_owned()
    }

    /// Returns the root folder of all generated data.
    pub fn storage_folder(&self) -> PathBuf {
        PathBuf::from(self.string_or("storage.folder", "storage"))
    }

    /// Returns the folder which contains the active saves.
    pub fn saves_folder(&self) -> PathBuf {
        PathBuf::from(self.string_or("saves.folder", "saves"))
    }

    /// Returns the folder which contains the archived saves.
    ///
    /// An empty value disables the archive.
    pub fn archive_folder(&self) -> Option<PathBuf> {
        Some(self.string_or("saves.archive", "archive"))
            .filter(|folder| !folder.is_empty())
            .map(PathBuf::from)
    }

    /// Returns the settings which control an extraction.
    pub fn extraction_settings(&self) -> ExtractionSettings {
        let auto_cache = match self.query("extraction.autoCache").as_vec() {
            Some(commands) => commands
                .iter()
                .filter_map(|command| command.as_str())
                .map(str::to_owned)
                .collect(),
            None => DEFAULT_AUTO_CACHE
                .iter()
                .map(|command| (*command).to_owned())
                .collect(),
        };

        ExtractionSettings {
            keep_fragments: self
                .query("extraction.keepFragments")
                .as_bool()
                .unwrap_or(true),
            auto_cache,
        }
    }

    /// Returns the configured log level.
    ///
    /// An unknown level is reported and replaced by **Info**.
    pub fn log_level(&self) -> LevelFilter {
        let level = self.string_or("logging.level", "info");
        match LevelFilter::from_str(&level) {
            Ok(level) => level,
            Err(_) => {
                log::warn!("Unknown log level '{}' - using 'info'...", level);
                LevelFilter::Info
            }
        }
    }
}
