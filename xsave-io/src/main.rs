use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use xsave::config::{Config, SETTINGS_FILE};
use xsave::extraction::{extract_save, ExtractionSettings, Outcome};
use xsave::query::cache::QueryCache;
use xsave::saves::{FolderSaveProvider, SaveFile, SaveProvider, SaveStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(SETTINGS_FILE)?;
    xsave::init_logging(config.log_level());
    log::info!("Starting xsave-io ({})...", xsave::XSAVE_VERSION);

    let storage = SaveStorage::new(config.storage_folder());
    let provider = FolderSaveProvider::new(config.saves_folder(), config.archive_folder());
    let settings = Arc::new(config.extraction_settings());

    // A single document is always streamed sequentially, but different saves can be
    // processed side by side...
    let permits = Arc::new(Semaphore::new(num_cpus::get().max(1)));
    let tasks = provider.active()?.into_iter().map(|save| {
        let storage = storage.clone();
        let settings = settings.clone();
        let permits = permits.clone();
        async move {
            let _permit = permits.acquire_owned().await?;
            let id = save.id.clone();
            let result = tokio::task::spawn_blocking(move || extract(&storage, &save, &settings))
                .await?;
            Ok::<_, anyhow::Error>((id, result))
        }
    });

    for task in join_all(tasks).await {
        match task {
            Ok((_, Ok(()))) => (),
            Ok((id, Err(error))) => log::error!("Failed to extract {}: {:#}", id, error),
            Err(error) => log::error!("An extraction task crashed: {:#}", error),
        }
    }

    let removed = QueryCache::new(storage).cleanup_obsolete_caches(&provider.known_save_ids()?)?;
    if removed > 0 {
        log::info!("Removed {} obsolete query caches.", removed);
    }

    Ok(())
}

fn extract(
    storage: &SaveStorage,
    save: &SaveFile,
    settings: &ExtractionSettings,
) -> anyhow::Result<()> {
    match extract_save(storage, save, settings)? {
        Outcome::Skipped => log::info!("{} is up to date.", save.id),
        Outcome::Extracted(summary) => log::info!(
            "{} is ready: {} components, {} event log categories.",
            save.id,
            summary.components,
            summary.categories.len()
        ),
    }

    Ok(())
}
