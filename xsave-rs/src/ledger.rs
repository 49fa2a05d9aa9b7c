//! Keeps track of which source files have been processed and which caches have been written.
//!
//! The ledger is a small JSON document (**analysis.json**) which lives in the output folder of
//! each save. It records the modification time of every source file at the moment it was fully
//! processed. A source is only processed again once its modification time changes. Next to that,
//! the document carries the manifest of the [event log cache](crate::eventlog::cache).
//!
//! The ledger is read once per run and then kept in memory. It is only written as the very last
//! step of a successful run, so that an interrupted run is simply redone from scratch.
//!
//! # Example
//! ```
//! # use std::time::{Duration, SystemTime};
//! # use xsave::ledger::Analysis;
//! let folder = tempfile::tempdir().unwrap();
//! let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
//!
//! let mut analysis = Analysis::open(folder.path().join("analysis.json"));
//! assert!(!analysis.has_been_processed("quicksave", modified));
//!
//! analysis.mark_processed("quicksave", modified);
//! analysis.save().unwrap();
//!
//! let analysis = Analysis::open(folder.path().join("analysis.json"));
//! assert!(analysis.has_been_processed("quicksave", modified));
//! assert!(!analysis.has_been_processed("quicksave", modified + Duration::from_secs(1)));
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Contains the name of the ledger file within the output folder of a save.
pub const ANALYSIS_FILE: &str = "analysis.json";

/// Records when a source file was processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDate {
    /// Contains the modification time (in millis since the epoch) of the source file.
    pub modified: i64,
    /// Contains the time (in millis since the epoch) at which processing completed.
    pub processed_at: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisData {
    #[serde(default)]
    process_dates: BTreeMap<String, ProcessDate>,
    #[serde(default)]
    cache_written_at: Option<i64>,
    #[serde(default, rename = "categoryIDs")]
    category_ids: Vec<String>,
}

/// Represents the ledger of an output folder.
#[derive(Debug, Clone)]
pub struct Analysis {
    file: PathBuf,
    data: AnalysisData,
}

/// Converts the given system time into milliseconds since the epoch.
pub fn to_millis(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp_millis()
}

/// Returns the current time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Analysis {
    /// Reads the ledger from the given file.
    ///
    /// A missing file yields an empty ledger. The same is true for a corrupt file, which is
    /// logged, as this simply leads to all sources being processed again.
    pub fn open(file: impl Into<PathBuf>) -> Analysis {
        let file = file.into();
        let data = if file.exists() {
            match crate::files::read_json::<AnalysisData>(&file) {
                Ok(data) => data,
                Err(error) => {
                    log::warn!(
                        "Ignoring the corrupt ledger {}: {:#}",
                        file.display(),
                        error
                    );
                    AnalysisData::default()
                }
            }
        } else {
            AnalysisData::default()
        };

        Analysis { file, data }
    }

    /// Returns the file backing this ledger.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Determines if the given source has been processed in the given version.
    pub fn has_been_processed(&self, source: &str, modified: SystemTime) -> bool {
        self.data
            .process_dates
            .get(source)
            .map(|date| date.modified == to_millis(modified))
            .unwrap_or(false)
    }

    /// Records that the given version of a source has been fully processed.
    ///
    /// Note that this only updates the in-memory state, [save](Analysis::save) has to be invoked
    /// to persist it.
    pub fn mark_processed(&mut self, source: &str, modified: SystemTime) {
        let _ = self.data.process_dates.insert(
            source.to_owned(),
            ProcessDate {
                modified: to_millis(modified),
                processed_at: now_millis(),
            },
        );
    }

    /// Returns the processing record of the given source.
    pub fn process_date(&self, source: &str) -> Option<&ProcessDate> {
        self.data.process_dates.get(source)
    }

    /// Returns the most recent time at which any source has been processed.
    pub fn last_processed_at(&self) -> Option<i64> {
        self.data
            .process_dates
            .values()
            .map(|date| date.processed_at)
            .max()
    }

    /// Returns the time at which the event log cache has been written.
    pub fn cache_written_at(&self) -> Option<i64> {
        self.data.cache_written_at
    }

    /// Returns the ids of the categories in the event log cache.
    pub fn category_ids(&self) -> &[String] {
        &self.data.category_ids
    }

    /// Records the manifest of a freshly written event log cache.
    pub fn set_cache_manifest(&mut self, written_at: i64, category_ids: Vec<String>) {
        self.data.cache_written_at = Some(written_at);
        self.data.category_ids = category_ids;
    }

    /// Removes the manifest of the event log cache, which renders the cache invalid.
    pub fn clear_cache_manifest(&mut self) {
        self.data.cache_written_at = None;
        self.data.category_ids.clear();
    }

    /// Persists the ledger.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        crate::files::write_json(&self.file, &self.data)
    }
}
