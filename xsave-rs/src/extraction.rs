//! Orchestrates the extraction of a single save.
//!
//! A run consults the [ledger](crate::ledger) first. If the savegame hasn't changed since it was
//! last processed, nothing is streamed at all - only the event log cache is regenerated from the
//! persisted collections in case it went missing. Otherwise a full pass is performed:
//!
//! 1. the **XML** folder is recreated and the document is streamed, writing fragments and
//!    expanding the small trees in memory,
//! 2. every fragment is handed to its processor, failing fragments are logged and skipped,
//! 3. the collections are written into the **JSON** folder,
//! 4. the event log is categorized and written into its cache,
//! 5. the ledger is saved, which marks the run as complete,
//! 6. the configured queries are warmed up.
//!
//! As the ledger is only written once everything else succeeded, an interrupted run is simply
//! repeated from scratch the next time.
use crate::components::registry::Collections;
use crate::components::{ComponentType, LogEntry};
use crate::eventlog::cache::LogCache;
use crate::eventlog::Categorizer;
use crate::fmt::{format_duration, format_size};
use crate::ledger::Analysis;
use crate::processors::ProcessingContext;
use crate::query::QueryService;
use crate::saves::{SaveFile, SaveStorage};
use crate::xml::actions::ActionTable;
use crate::xml::extractor::{ExtractionStats, Extractor};
use anyhow::Context;
use itertools::Itertools;
use std::path::Path;
use std::time::{Duration, Instant};

/// Controls the behaviour of an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// Determines if fragment files are kept once they have been processed.
    pub keep_fragments: bool,
    /// Lists the query commands which are cached right after an extraction.
    pub auto_cache: Vec<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        ExtractionSettings {
            keep_fragments: true,
            auto_cache: crate::config::DEFAULT_AUTO_CACHE
                .iter()
                .map(|command| (*command).to_owned())
                .collect(),
        }
    }
}

/// Summarizes a full pass over a savegame.
#[derive(Debug, Clone)]
pub struct ExtractionSummary {
    /// Contains the metrics of the streaming phase.
    pub stats: ExtractionStats,
    /// Contains the number of fragments which could not be processed.
    pub failed_fragments: usize,
    /// Contains the total number of components created.
    pub components: usize,
    /// Contains the ids of the event log categories written.
    pub categories: Vec<String>,
    /// Contains the number of query results cached after the extraction.
    pub warmed_queries: usize,
    /// Contains the wall clock time of the whole run.
    pub duration: Duration,
}

/// Describes the outcome of [extract_save].
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The save was unchanged since its last extraction.
    Skipped,
    /// The save has been fully processed.
    Extracted(ExtractionSummary),
}

/// Extracts the given save into its output folder within the given storage.
///
/// Setup errors (the document cannot be opened, an output folder cannot be created) abort the
/// run. Problems within a single fragment are logged and only skip that fragment.
pub fn extract_save(
    storage: &SaveStorage,
    save: &SaveFile,
    settings: &ExtractionSettings,
) -> anyhow::Result<Outcome> {
    let mut analysis = Analysis::open(storage.analysis_file(&save.id));
    if analysis.has_been_processed(&save.id, save.modified) {
        log::debug!("{} is unchanged since its last extraction...", save.id);
        ensure_log_cache(storage, &save.id, &mut analysis)?;
        return Ok(Outcome::Skipped);
    }

    let watch = Instant::now();
    let size = std::fs::metadata(&save.path)
        .map(|metadata| metadata.len())
        .unwrap_or(0);
    log::info!(
        "Extracting {} ({}) from {}...",
        save.id,
        format_size(size),
        save.path.display()
    );

    let xml_dir = storage.xml_dir(&save.id);
    let json_dir = storage.json_dir(&save.id);
    recreate_dir(&xml_dir)?;
    std::fs::create_dir_all(&json_dir)
        .with_context(|| format!("Cannot create {}", json_dir.display()))?;

    let actions = ActionTable::savegame();
    let mut extractor = Extractor::new(&actions, &xml_dir);
    let mut collections = Collections::new();
    let mut failed_fragments = 0;

    let stats = {
        let mut context = ProcessingContext::new(&mut collections, &json_dir);
        let stats = extractor.run_file(&save.path, |handler, tree| {
            crate::processors::handle_tree(handler, tree, &mut context)
        })?;
        log::info!(
            "Streamed {} elements of {}: {} fragments, {} skipped subtrees",
            stats.elements,
            save.id,
            stats.fragments,
            stats.skipped_subtrees
        );

        for fragment in extractor.into_fragments() {
            log::debug!("Processing {}...", fragment.file.display());
            if let Err(error) = crate::processors::process_file(&fragment, &mut context) {
                log::warn!(
                    "Skipping fragment {} ({}): {:#}",
                    fragment.file.display(),
                    fragment.tag_path,
                    error
                );
                failed_fragments += 1;
            }

            if !settings.keep_fragments {
                if let Err(error) = std::fs::remove_file(&fragment.file) {
                    log::warn!(
                        "Cannot remove fragment {}: {}",
                        fragment.file.display(),
                        error
                    );
                }
            }
        }

        stats
    };

    collections.save(&json_dir)?;

    let categories = Categorizer::standard().categorize(&collections.log_entries());
    analysis.mark_processed(&save.id, save.modified);
    LogCache::new(storage.event_log_dir(&save.id)).generate(&categories, &mut analysis)?;
    analysis.save()?;

    let warmed_queries = QueryService::new(storage.clone()).warm_up(&save.id, &settings.auto_cache);

    let summary = ExtractionSummary {
        stats,
        failed_fragments,
        components: collections.len(),
        categories: categories
            .into_iter()
            .map(|category| category.id)
            .collect(),
        warmed_queries,
        duration: watch.elapsed(),
    };
    log::info!(
        "Extracted {} components of {} in {} (categories: {}, failed fragments: {}, cached queries: {})",
        summary.components,
        save.id,
        format_duration(summary.duration),
        summary.categories.iter().join(", "),
        summary.failed_fragments,
        summary.warmed_queries
    );

    Ok(Outcome::Extracted(summary))
}

fn recreate_dir(folder: &Path) -> anyhow::Result<()> {
    if folder.exists() {
        std::fs::remove_dir_all(folder)
            .with_context(|| format!("Cannot clear {}", folder.display()))?;
    }

    std::fs::create_dir_all(folder).with_context(|| format!("Cannot create {}", folder.display()))
}

/// Regenerates the event log cache of an already extracted save if it is incomplete.
fn ensure_log_cache(
    storage: &SaveStorage,
    save_id: &str,
    analysis: &mut Analysis,
) -> anyhow::Result<()> {
    let log_cache = LogCache::new(storage.event_log_dir(save_id));
    if log_cache.is_valid(analysis) {
        return Ok(());
    }

    log::info!("Regenerating the event log cache of {}...", save_id);
    let entries = Collections::load(&storage.json_dir(save_id), ComponentType::LogEntry)?
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<LogEntry>(entry) {
            Ok(entry) => Some(entry),
            Err(error) => {
                log::warn!("Skipping an invalid log entry of {}: {}", save_id, error);
                None
            }
        })
        .collect::<Vec<_>>();

    log_cache.generate(&Categorizer::standard().categorize(&entries), analysis)?;
    analysis.save()
}

#[cfg(test)]
mod tests {
    use crate::components::registry::Collections;
    use crate::components::ComponentType;
    use crate::extraction::{extract_save, ExtractionSettings, Outcome};
    use crate::ledger::Analysis;
    use crate::saves::{SaveFile, SaveStorage};
    use std::path::Path;

    const SAVEGAME: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<savegame>
  <info>
    <save name="Test" date="1700000000"/>
    <game version="700" build="123" time="3600.5"/>
    <player name="Kaela" money="125000"/>
  </info>
  <universe>
    <component class="galaxy" macro="xu_ep2_universe_macro" connection="galaxy" code="GAL-1" id="[0x1]">
      <connections>
        <connection connection="cluster_01_connection">
          <component class="cluster" macro="cluster_01_macro" connection="galaxy" code="CL-1" id="[0x10]">
            <connections>
              <connection connection="sector_01_connection">
                <component class="sector" macro="cluster_01_sector001_macro" connection="cluster" code="SE-1" owner="argon" id="[0x11]"/>
              </connection>
            </connections>
          </component>
        </connection>
      </connections>
    </component>
    <jobs><job id="j1"/></jobs>
  </universe>
  <log>
    <entry time="10" category="upkeep" title="Trade completed" text="Sold energy cells" money="1000"/>
    <entry time="20" category="missions" title="Mission accepted" text="Deliver goods"/>
  </log>
</savegame>
"#;

    fn save_file(folder: &Path) -> SaveFile {
        let path = folder.join("quicksave.xml");
        std::fs::write(&path, SAVEGAME).unwrap();
        SaveFile {
            id: "quicksave".to_owned(),
            modified: std::fs::metadata(&path).unwrap().modified().unwrap(),
            path,
            archived: false,
        }
    }

    #[test]
    fn unchanged_saves_are_skipped() {
        let saves = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(output.path());
        let save = save_file(saves.path());
        let settings = ExtractionSettings::default();

        match extract_save(&storage, &save, &settings).unwrap() {
            Outcome::Extracted(summary) => {
                assert_eq!(summary.failed_fragments, 0);
                assert!(summary.components >= 4);
                assert_eq!(summary.categories.last().unwrap(), "misc");
                assert_eq!(summary.warmed_queries, 3);
            }
            Outcome::Skipped => panic!("The first run has to extract the save"),
        }
        assert!(storage.json_dir("quicksave").join("savegame-info.json").is_file());

        assert!(matches!(
            extract_save(&storage, &save, &settings).unwrap(),
            Outcome::Skipped
        ));
    }

    #[test]
    fn a_missing_log_cache_is_regenerated() {
        let saves = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(output.path());
        let save = save_file(saves.path());
        let settings = ExtractionSettings {
            keep_fragments: false,
            auto_cache: Vec::new(),
        };

        let _ = extract_save(&storage, &save, &settings).unwrap();
        assert_eq!(
            std::fs::read_dir(storage.xml_dir("quicksave")).unwrap().count(),
            0
        );

        std::fs::remove_dir_all(storage.event_log_dir("quicksave")).unwrap();
        assert!(matches!(
            extract_save(&storage, &save, &settings).unwrap(),
            Outcome::Skipped
        ));

        let analysis = Analysis::open(storage.analysis_file("quicksave"));
        assert!(analysis.category_ids().iter().any(|id| id == "trade"));
        assert!(storage
            .event_log_dir("quicksave")
            .join("missions.json")
            .is_file());
    }

    #[test]
    fn broken_parts_are_skipped_without_aborting_the_run() {
        let saves = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(output.path());
        let path = saves.path().join("broken.xml");
        std::fs::write(
            &path,
            r#"<savegame>
  <info><player name="A &bogus; B" money="10"/></info>
  <universe>
    <inventory><ware ware="inv_spacefuel" amount="lots"/></inventory>
  </universe>
  <log><entry time="1" title="Trade completed" text="Sold wares"/></log>
</savegame>"#,
        )
        .unwrap();
        let save = SaveFile {
            id: "broken".to_owned(),
            modified: std::fs::metadata(&path).unwrap().modified().unwrap(),
            path,
            archived: false,
        };

        let summary = match extract_save(&storage, &save, &ExtractionSettings::default()).unwrap()
        {
            Outcome::Extracted(summary) => summary,
            Outcome::Skipped => panic!("The save has never been extracted"),
        };
        assert_eq!(summary.failed_fragments, 1);
        assert_eq!(summary.stats.failed_trees, 0);

        let players: Vec<serde_json::Value> =
            Collections::load(&storage.json_dir("broken"), ComponentType::Player).unwrap();
        assert_eq!(players[0]["name"], "A &bogus; B");
        assert_eq!(
            Collections::load(&storage.json_dir("broken"), ComponentType::LogEntry)
                .unwrap()
                .len(),
            1
        );

        // The run counts as complete, so it isn't repeated...
        let analysis = Analysis::open(storage.analysis_file("broken"));
        assert!(analysis.has_been_processed("broken", save.modified));
        assert!(matches!(
            extract_save(&storage, &save, &ExtractionSettings::default()).unwrap(),
            Outcome::Skipped
        ));
    }

    #[test]
    fn a_missing_document_is_fatal() {
        let output = tempfile::tempdir().unwrap();
        let storage = SaveStorage::new(output.path());
        let save = SaveFile {
            id: "gone".to_owned(),
            path: output.path().join("gone.xml"),
            modified: std::time::SystemTime::now(),
            archived: false,
        };

        assert!(extract_save(&storage, &save, &ExtractionSettings::default()).is_err());
        assert!(!storage.analysis_file("gone").exists());
    }
}
