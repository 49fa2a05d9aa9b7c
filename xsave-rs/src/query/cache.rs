//! Stores query results on disk.
//!
//! Each entry is a JSON file `query-<key>.json` in the **.cache** folder of a save. An entry is
//! valid as long as it is at least as recent as the data of its save. As each extraction
//! rewrites the ledger of a save, all cached results become stale automatically once a save is
//! extracted again - there is no need to invalidate anything explicitly.
//!
//! Writes are atomic (see [files](crate::files)), so that two concurrent writers of the same key
//! only waste some work but never corrupt an entry.
use crate::saves::SaveStorage;
use anyhow::Context;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Contains the name of the folder which holds the cache entries of a save.
pub const CACHE_FOLDER: &str = ".cache";

/// Provides access to the cached query results of all saves.
#[derive(Debug, Clone)]
pub struct QueryCache {
    storage: SaveStorage,
}

impl QueryCache {
    /// Creates a cache for the given storage.
    pub fn new(storage: SaveStorage) -> Self {
        QueryCache { storage }
    }

    /// Returns the file which stores the given entry.
    pub fn cache_file(&self, save_id: &str, key: &str) -> PathBuf {
        self.storage
            .cache_dir(save_id)
            .join(format!("query-{}.json", key))
    }

    /// Stores the given data for the given save and key.
    pub fn store(&self, save_id: &str, key: &str, data: &Value) -> anyhow::Result<()> {
        let folder = self.storage.cache_dir(save_id);
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("Cannot create {}", folder.display()))?;
        crate::files::write_json(&self.cache_file(save_id, key), data)?;
        log::debug!("Stored query cache {} for {}", key, save_id);

        Ok(())
    }

    /// Determines if a valid entry exists for the given save and key.
    ///
    /// An entry is valid if it has been written after (or at the same time as) the data of the
    /// save. An entry of a save which has not been extracted is never valid.
    pub fn is_valid(&self, save_id: &str, key: &str) -> bool {
        let data_modified = match self.storage.data_modified(save_id) {
            Some(modified) => modified,
            None => return false,
        };

        std::fs::metadata(self.cache_file(save_id, key))
            .and_then(|metadata| metadata.modified())
            .map(|cache_modified| cache_modified >= data_modified)
            .unwrap_or(false)
    }

    /// Returns the cached data for the given save and key if it is still valid.
    ///
    /// A corrupt entry is logged and treated like a missing one.
    pub fn retrieve(&self, save_id: &str, key: &str) -> Option<Value> {
        if !self.is_valid(save_id, key) {
            log::debug!("Query cache miss: {} for {}", key, save_id);
            return None;
        }

        match crate::files::read_json(&self.cache_file(save_id, key)) {
            Ok(data) => {
                log::debug!("Query cache hit: {} for {}", key, save_id);
                Some(data)
            }
            Err(error) => {
                log::warn!("Ignoring a corrupt query cache: {:#}", error);
                None
            }
        }
    }

    /// Removes the cache folders of all saves and returns how many have been removed.
    pub fn clear_all(&self) -> anyhow::Result<usize> {
        self.remove_cache_folders(|_| true)
    }

    /// Removes the cache folders of all saves which are no longer known.
    ///
    /// The storage is scanned recursively, so that cache folders of nested save folders are
    /// found as well. Returns the number of removed folders.
    pub fn cleanup_obsolete_caches(&self, known_save_ids: &HashSet<String>) -> anyhow::Result<usize> {
        self.remove_cache_folders(|save_id| !known_save_ids.contains(save_id))
    }

    fn remove_cache_folders<F>(&self, is_obsolete: F) -> anyhow::Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let root = self.storage.root();
        if !root.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for cache_folder in self.find_cache_folders(root) {
            let save_id = match save_id_of(root, &cache_folder) {
                Some(save_id) => save_id,
                None => continue,
            };
            if !is_obsolete(&save_id) || !cache_folder.exists() {
                continue;
            }

            std::fs::remove_dir_all(&cache_folder)
                .with_context(|| format!("Cannot remove {}", cache_folder.display()))?;
            log::debug!("Removed query cache {}", cache_folder.display());
            removed += 1;
        }

        Ok(removed)
    }

    fn find_cache_folders(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .min_depth(2)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    log::warn!("Failed to scan the storage: {}", error);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir() && entry.file_name() == CACHE_FOLDER)
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// Determines the save which owns the given cache folder, which is the first folder below root.
fn save_id_of(root: &Path, cache_folder: &Path) -> Option<String> {
    cache_folder
        .strip_prefix(root)
        .ok()?
        .components()
        .next()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use crate::query::cache::QueryCache;
    use crate::saves::SaveStorage;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::{Duration, SystemTime};

    fn extracted(storage: &SaveStorage, save_id: &str) {
        std::fs::create_dir_all(storage.save_dir(save_id)).unwrap();
        std::fs::write(storage.analysis_file(save_id), "{}").unwrap();
    }

    fn touch(file: &std::path::Path, time: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(file)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn entries_are_invalidated_by_newer_data() {
        let folder = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(folder.path());
        let cache = QueryCache::new(storage.clone());
        extracted(&storage, "quicksave");

        // Nothing has been stored yet...
        assert!(!cache.is_valid("quicksave", "ships"));
        assert_eq!(cache.retrieve("quicksave", "ships"), None);

        cache
            .store("quicksave", "ships", &json!([{"name": "Blue Horizon"}]))
            .unwrap();
        let past = SystemTime::now() - Duration::from_secs(3600);
        touch(&storage.analysis_file("quicksave"), past);
        assert!(cache.is_valid("quicksave", "ships"));
        assert_eq!(
            cache.retrieve("quicksave", "ships").unwrap()[0]["name"],
            "Blue Horizon"
        );

        // Once the save is extracted again, the entry is stale...
        touch(
            &storage.analysis_file("quicksave"),
            SystemTime::now() + Duration::from_secs(3600),
        );
        assert!(!cache.is_valid("quicksave", "ships"));
        assert_eq!(cache.retrieve("quicksave", "ships"), None);
    }

    #[test]
    fn corrupt_entries_are_a_cache_miss() {
        let folder = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(folder.path());
        let cache = QueryCache::new(storage.clone());
        extracted(&storage, "quicksave");
        touch(
            &storage.analysis_file("quicksave"),
            SystemTime::now() - Duration::from_secs(3600),
        );

        std::fs::create_dir_all(storage.cache_dir("quicksave")).unwrap();
        std::fs::write(cache.cache_file("quicksave", "ships"), "[{\"name\":").unwrap();
        assert!(cache.is_valid("quicksave", "ships"));
        assert_eq!(cache.retrieve("quicksave", "ships"), None);
    }

    #[test]
    fn only_caches_of_unknown_saves_are_cleaned_up() {
        let folder = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(folder.path());
        let cache = QueryCache::new(storage.clone());
        for save_id in ["quicksave", "archive-autosave", "deleted"] {
            extracted(&storage, save_id);
            cache.store(save_id, "ships", &json!([])).unwrap();
        }
        let nested = storage.save_dir("deleted").join("JSON").join(".cache").join("inner");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("query-x.json"), "[]").unwrap();

        let known: HashSet<String> = ["quicksave", "archive-autosave"]
            .iter()
            .map(|id| (*id).to_owned())
            .collect();
        assert_eq!(cache.cleanup_obsolete_caches(&known).unwrap(), 2);

        assert!(storage.cache_dir("quicksave").exists());
        assert!(storage.cache_dir("archive-autosave").exists());
        assert!(!storage.cache_dir("deleted").exists());
        assert!(!nested.exists());
        assert!(storage.save_dir("deleted").exists());

        // Running it again has nothing left to do...
        assert_eq!(cache.cleanup_obsolete_caches(&known).unwrap(), 0);

        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(!storage.cache_dir("quicksave").exists());
    }
}
