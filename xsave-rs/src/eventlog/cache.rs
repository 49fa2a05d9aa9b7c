//! Persists the categorized event log.
//!
//! Each category is written into its own file `<categoryID>.json` within the **event-log** folder
//! of a save. The manifest (when the cache was written and which categories it contains) is kept
//! in the [ledger](crate::ledger::Analysis). The cache is valid as long as it has been written
//! after the last extraction and all category files are present.
use crate::eventlog::LogCategory;
use crate::ledger::Analysis;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Contains the name of the folder (within the JSON folder) which holds the category files.
pub const EVENT_LOG_FOLDER: &str = "event-log";

/// Provides access to the category files of a save.
#[derive(Debug, Clone)]
pub struct LogCache {
    folder: PathBuf,
}

impl LogCache {
    /// Creates a cache which is stored in the given folder.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        LogCache {
            folder: folder.into(),
        }
    }

    /// Returns the folder of this cache.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Returns the file which contains the given category.
    pub fn category_file(&self, category_id: &str) -> PathBuf {
        self.folder.join(format!("{}.json", category_id))
    }

    /// Determines if the cache can be used.
    ///
    /// This requires a manifest which is at least as recent as the last extraction, along with
    /// all the category files it lists.
    pub fn is_valid(&self, analysis: &Analysis) -> bool {
        let written_at = match analysis.cache_written_at() {
            Some(written_at) => written_at,
            None => return false,
        };
        if analysis
            .last_processed_at()
            .map(|processed_at| processed_at > written_at)
            .unwrap_or(false)
        {
            return false;
        }

        !analysis.category_ids().is_empty()
            && analysis
                .category_ids()
                .iter()
                .all(|id| self.category_file(id).is_file())
    }

    /// Writes all given categories and records them in the manifest.
    ///
    /// Any previous contents are discarded. Note that the ledger itself isn't saved here, as this
    /// has to be the last step of an extraction.
    pub fn generate(
        &self,
        categories: &[LogCategory],
        analysis: &mut Analysis,
    ) -> anyhow::Result<()> {
        analysis.clear_cache_manifest();
        if self.folder.exists() {
            std::fs::remove_dir_all(&self.folder)
                .with_context(|| format!("Cannot clear {}", self.folder.display()))?;
        }
        std::fs::create_dir_all(&self.folder)
            .with_context(|| format!("Cannot create {}", self.folder.display()))?;

        for category in categories {
            crate::files::write_json(&self.category_file(&category.id), category)?;
        }

        analysis.set_cache_manifest(
            crate::ledger::now_millis(),
            categories
                .iter()
                .map(|category| category.id.clone())
                .collect(),
        );
        log::debug!(
            "Wrote {} event log categories into {}",
            categories.len(),
            self.folder.display()
        );

        Ok(())
    }

    /// Reads the given category.
    ///
    /// Returns **None** if the category doesn't exist. A corrupt file is logged and also treated
    /// as missing.
    pub fn load_category(&self, category_id: &str) -> Option<LogCategory> {
        let file = self.category_file(category_id);
        if !file.is_file() {
            return None;
        }

        match crate::files::read_json(&file) {
            Ok(category) => Some(category),
            Err(error) => {
                log::warn!("Ignoring corrupt event log category: {:#}", error);
                None
            }
        }
    }

    /// Reads all categories listed in the manifest.
    pub fn load(&self, analysis: &Analysis) -> anyhow::Result<Vec<LogCategory>> {
        analysis
            .category_ids()
            .iter()
            .map(|id| {
                self.load_category(id)
                    .ok_or_else(|| anyhow::anyhow!("The event log category {} is missing", id))
            })
            .collect()
    }
}
