use crate::cli::IntervalParams;
use crate::config::Config;
use crate::download::Coordinator;
use crate::error::FetchCacheError;
use crate::eviction::Sweeper;
use crate::init::{InitOutcome, initialize, open_store};
use crate::store::MetadataStore;

pub async fn run_init(config: Config) -> Result<(), FetchCacheError> {
    let store = MetadataStore::connect(&config.storage).await?;
    match initialize(
        &store,
        &config.storage.init_lock_path,
        config.eviction.default_interval_minutes,
    )
    .await? {
        InitOutcome::Initialized => println!("Database initialized"),
        InitOutcome::Skipped => println!("Another process is initializing the database"),
    }
    store.close().await;
    Ok(())
}

/// One stateless eviction pass, for cron or a systemd timer.
pub async fn run_sweep(config: Config) -> Result<(), FetchCacheError> {
    let store = open_store(&config).await?;
    let report = Sweeper::new(&config, store.clone()).sweep().await?;
    store.close().await;

    println!(
        "Scanned {} file(s), evicted {}, failed {} (interval {} min)",
        report.scanned, report.deleted, report.failed, report.interval_minutes
    );
    Ok(())
}

pub async fn run_interval(params: IntervalParams) -> Result<(), FetchCacheError> {
    let IntervalParams { config, minutes } = params;
    let coordinator = Coordinator::new(&config, open_store(&config).await?)?;

    if let Some(minutes) = minutes {
        coordinator.set_eviction_interval(minutes).await?;
        tracing::info!(minutes, "Eviction interval updated");
    }
    println!("{}", coordinator.eviction_interval().await?);
    Ok(())
}
