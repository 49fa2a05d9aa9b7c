//! Xsave turns large X4 savegames into cached and queryable JSON collections.
//!
//! # Introduction
//! A savegame is a single XML document of tens or hundreds of megabytes. Loading it as a whole
//! would be wasteful, as most of its contents (economy logs, AI state, physics) are of no interest
//! when answering questions like "which ships do I own and who is flying them". Therefore,
//! **Xsave** streams the document once and decides per element, based on its
//! [tag path](xml::path::TagPath), whether to skip it, to write it into a fragment file for later
//! processing or to expand it into a small in-memory tree right away (see [xml]).
//!
//! The fragments are then handed to the [processors] which build a typed graph of
//! [components] (clusters, sectors, zones, stations, ships, people, log entries). Each component
//! knows its parent by a global unique id (`typeID:componentID`) which is resolved through the
//! [registry](components::registry::Collections). Finally, every component type is written into
//! its own JSON collection.
//!
//! # Caching
//! Extracting a save is expensive, therefore everything is cached:
//! * the [ledger] records when a savegame was processed, so that an unchanged save is skipped
//!   entirely,
//! * the [event log](eventlog) is categorized once and stored per category,
//! * query results are stored by the [query] layer and are invalidated automatically once the
//!   save is extracted again.
//!
//! # Modules
//! * **Extraction**: The [extraction] module orchestrates a complete run for a single save.
//! * **Saves**: The [saves] module lists the available savegames and defines the layout of the
//!   output folders.
//! * **Query**: The [query] module answers paginated (and optionally filtered) queries against
//!   the extracted collections.
//! * **Config**: The [config] module reads the settings from **config/settings.yml**.
//!
//! # Examples
//! The executable **xsave-io** extracts all saves of the configured folder. A minimal setup
//! looks like this:
//! ```no_run
//! # use xsave::config::Config;
//! # use xsave::extraction::extract_save;
//! # use xsave::saves::{FolderSaveProvider, SaveProvider, SaveStorage};
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load(xsave::config::SETTINGS_FILE)?;
//! xsave::init_logging(config.log_level());
//!
//! let storage = SaveStorage::new(config.storage_folder());
//! let provider = FolderSaveProvider::new(config.saves_folder(), config.archive_folder());
//! for save in provider.active()? {
//!     let _ = extract_save(&storage, &save, &config.extraction_settings())?;
//! }
//! # Ok(())
//! # }
//! ```
#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod components;
pub mod config;
pub mod eventlog;
pub mod extraction;
pub mod files;
pub mod fmt;
pub mod ledger;
pub mod processors;
pub mod query;
pub mod saves;
pub mod xml;

/// Contains the version of the Xsave library.
pub const XSAVE_VERSION: &str = "DEVELOPMENT-SNAPSHOT";

/// Initializes the logging system.
///
/// Only the first invocation has an effect, later calls (with a possibly different level) are
/// ignored.
pub fn init_logging(level: LevelFilter) {
    static INIT_LOGGING: Once = Once::new();

    // We need to do this as otherwise the integration tests might crash as the logging system
    // is initialized several times...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            level,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            panic!("Failed to initialize logging system: {}", error);
        }
    });
}
