//! Locates the savegames to process and the folders which receive their data.
//!
//! A [SaveProvider] lists the active and archived savegames. The default implementation
//! [FolderSaveProvider] simply lists all XML files within two folders. All generated data of a
//! save is stored in its own folder below the storage root, which is managed by [SaveStorage]:
//!
//! ```text
//! <storage>/<save-id>/analysis.json
//! <storage>/<save-id>/JSON/collection-<typeID>.json
//! <storage>/<save-id>/JSON/event-log/<categoryID>.json
//! <storage>/<save-id>/XML/<tagPath>-<counter>.xml
//! <storage>/<save-id>/.cache/query-<key>.json
//! ```
use anyhow::Context;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Contains the prefix of the ids of archived saves.
pub const ARCHIVE_PREFIX: &str = "archive-";

/// Describes a savegame on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFile {
    /// Contains the id which also names the output folder.
    pub id: String,
    /// Contains the location of the XML document.
    pub path: PathBuf,
    /// Contains the last modification time of the document.
    pub modified: SystemTime,
    /// Determines if the save is in the archive.
    pub archived: bool,
}

/// Provides the savegames which are known to the system.
pub trait SaveProvider {
    /// Lists all active saves.
    fn active(&self) -> anyhow::Result<Vec<SaveFile>>;

    /// Lists all archived saves.
    fn archived(&self) -> anyhow::Result<Vec<SaveFile>>;

    /// Returns the ids of all active and archived saves.
    fn known_save_ids(&self) -> anyhow::Result<HashSet<String>> {
        Ok(self
            .active()?
            .into_iter()
            .chain(self.archived()?)
            .map(|save| save.id)
            .collect())
    }

    /// Looks up a save by its id.
    fn find(&self, id: &str) -> anyhow::Result<Option<SaveFile>> {
        Ok(self
            .active()?
            .into_iter()
            .chain(self.archived()?)
            .find(|save| save.id == id))
    }
}

/// Lists the XML files of a saves folder and an optional archive folder.
#[derive(Debug, Clone)]
pub struct FolderSaveProvider {
    saves: PathBuf,
    archive: Option<PathBuf>,
}

impl FolderSaveProvider {
    /// Creates a provider for the given folders.
    pub fn new(saves: impl Into<PathBuf>, archive: Option<PathBuf>) -> Self {
        FolderSaveProvider {
            saves: saves.into(),
            archive,
        }
    }

    fn list(folder: &Path, archived: bool) -> anyhow::Result<Vec<SaveFile>> {
        if !folder.is_dir() {
            log::debug!("{} doesn't exist - no saves there...", folder.display());
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        for entry in std::fs::read_dir(folder)
            .with_context(|| format!("Cannot list {}", folder.display()))?
        {
            let path = entry?.path();
            if !path.is_file() || path.extension().map(|ext| ext != "xml").unwrap_or(true) {
                continue;
            }

            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let id = if archived {
                format!("{}{}", ARCHIVE_PREFIX, save_id_of(&stem))
            } else {
                save_id_of(&stem)
            };
            let modified = std::fs::metadata(&path)
                .and_then(|metadata| metadata.modified())
                .with_context(|| format!("Cannot determine the age of {}", path.display()))?;

            result.push(SaveFile {
                id,
                path,
                modified,
                archived,
            });
        }
        result.sort_by(|left, right| left.id.cmp(&right.id));

        Ok(result)
    }
}

impl SaveProvider for FolderSaveProvider {
    fn active(&self) -> anyhow::Result<Vec<SaveFile>> {
        FolderSaveProvider::list(&self.saves, false)
    }

    fn archived(&self) -> anyhow::Result<Vec<SaveFile>> {
        match &self.archive {
            Some(archive) => FolderSaveProvider::list(archive, true),
            None => Ok(Vec::new()),
        }
    }
}

/// Derives a save id from a file name.
///
/// The id is used as folder name and as part of cache keys, therefore only ASCII letters, digits,
/// `-` and `_` are kept.
///
/// # Example
/// ```
/// assert_eq!(xsave::saves::save_id_of("quicksave"), "quicksave");
/// assert_eq!(xsave::saves::save_id_of("Save 01 (Argon)"), "save-01--argon-");
/// ```
pub fn save_id_of(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' | '-' | '_' => ch,
            'A'..='Z' => ch.to_ascii_lowercase(),
            _ => '-',
        })
        .collect()
}

/// Manages the output folders of all saves.
#[derive(Debug, Clone)]
pub struct SaveStorage {
    root: PathBuf,
}

impl SaveStorage {
    /// Creates a storage located in the given folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SaveStorage { root: root.into() }
    }

    /// Returns the root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the folder of the given save.
    pub fn save_dir(&self, save_id: &str) -> PathBuf {
        self.root.join(save_id)
    }

    /// Returns the folder which receives the collections and flat documents.
    pub fn json_dir(&self, save_id: &str) -> PathBuf {
        self.save_dir(save_id).join("JSON")
    }

    /// Returns the folder which receives the fragments.
    pub fn xml_dir(&self, save_id: &str) -> PathBuf {
        self.save_dir(save_id).join("XML")
    }

    /// Returns the folder which receives the categories of the event log.
    pub fn event_log_dir(&self, save_id: &str) -> PathBuf {
        self.json_dir(save_id)
            .join(crate::eventlog::cache::EVENT_LOG_FOLDER)
    }

    /// Returns the folder which receives the query caches.
    pub fn cache_dir(&self, save_id: &str) -> PathBuf {
        self.save_dir(save_id).join(".cache")
    }

    /// Returns the ledger file.
    pub fn analysis_file(&self, save_id: &str) -> PathBuf {
        self.save_dir(save_id).join(crate::ledger::ANALYSIS_FILE)
    }

    /// Returns the time at which the data of the given save has last been modified.
    ///
    /// As the ledger is the last file written by an extraction, this is its modification time.
    /// Returns **None** if the save has never been extracted.
    pub fn data_modified(&self, save_id: &str) -> Option<SystemTime> {
        std::fs::metadata(self.analysis_file(save_id))
            .and_then(|metadata| metadata.modified())
            .ok()
    }

    /// Determines if the given save has been extracted.
    pub fn is_extracted(&self, save_id: &str) -> bool {
        self.analysis_file(save_id).is_file()
    }

    /// Lists the ids of all saves which have a folder in this storage.
    pub fn save_ids(&self) -> anyhow::Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("Cannot list {}", self.root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                result.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        result.sort();

        Ok(result)
    }
}
