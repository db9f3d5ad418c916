//! One-time database initialization across cooperating processes.
//!
//! Several workers may start at once against the same storage. The first one
//! to take the exclusive lock on the init lock file creates the schema and
//! seeds defaults; the others skip initialization and proceed.

use crate::config::Config;
use crate::error::FetchCacheError;
use crate::store::MetadataStore;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    /// Another process held the lock
    Skipped,
}

/// Create the schema and seed `default_interval_minutes` as the eviction
/// interval, unless another process already holds the init lock.
pub async fn initialize(
    store: &MetadataStore,
    lock_path: &Path,
    default_interval_minutes: u32,
) -> Result<InitOutcome, FetchCacheError> {
    let lock_error = |reason: String| FetchCacheError::InitLock {
        path: lock_path.to_path_buf(),
        reason,
    };

    if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| lock_error(e.to_string()))?;
    }

    let path = lock_path.to_path_buf();
    let lock_file = tokio::task::spawn_blocking(move || try_acquire(&path))
        .await
        .map_err(|e| lock_error(e.to_string()))?
        .map_err(|e| lock_error(e.to_string()))?;

    let Some(lock_file) = lock_file else {
        tracing::info!(
            lock = %lock_path.display(),
            "Database is being initialized by another process, skipping"
        );
        return Ok(InitOutcome::Skipped);
    };

    tracing::debug!(lock = %lock_path.display(), "Acquired init lock");
    store.create_schema().await?;
    store.seed_defaults(default_interval_minutes).await?;
    tracing::info!("Database initialized");

    // Closing the handle releases the lock.
    drop(lock_file);
    Ok(InitOutcome::Initialized)
}

/// Open the lock file and try to lock it. `None` when another holder has it.
fn try_acquire(path: &Path) -> std::io::Result<Option<File>> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e),
    }
}

/// Connect to the metadata database and run the init guard.
pub async fn open_store(config: &Config) -> Result<MetadataStore, FetchCacheError> {
    let store = MetadataStore::connect(&config.storage).await?;
    initialize(
        &store,
        &config.storage.init_lock_path,
        config.eviction.default_interval_minutes,
    )
    .await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::storage_config;

    #[tokio::test]
    async fn test_initialize_creates_schema_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage_config(&dir);
        let store = MetadataStore::connect(&config).await.unwrap();

        let outcome = initialize(&store, &config.init_lock_path, 60).await.unwrap();

        assert_eq!(outcome, InitOutcome::Initialized);
        assert_eq!(store.eviction_interval().await.unwrap(), 60);
        assert!(config.init_lock_path.exists());
    }

    #[tokio::test]
    async fn test_initialize_skips_while_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage_config(&dir);
        let store = MetadataStore::connect(&config).await.unwrap();

        let holder = std::fs::File::create(&config.init_lock_path).unwrap();
        holder.lock_exclusive().unwrap();

        let outcome = initialize(&store, &config.init_lock_path, 60).await.unwrap();
        assert_eq!(outcome, InitOutcome::Skipped);

        drop(holder);
        let outcome = initialize(&store, &config.init_lock_path, 60).await.unwrap();
        assert_eq!(outcome, InitOutcome::Initialized);
    }

    #[tokio::test]
    async fn test_initialize_seeds_configured_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage = storage_config(&dir);
        config.eviction.default_interval_minutes = 5;

        let store = open_store(&config).await.unwrap();

        assert_eq!(store.eviction_interval().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_initialize_creates_missing_lock_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = storage_config(&dir);
        let store = MetadataStore::connect(&config).await.unwrap();
        let lock_path = dir.path().join("locks").join("db_init.lock");

        let outcome = initialize(&store, &lock_path, 60).await.unwrap();

        assert_eq!(outcome, InitOutcome::Initialized);
        assert!(lock_path.exists());
    }

    #[tokio::test]
    async fn test_repeated_initialization_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage = storage_config(&dir);

        let store = open_store(&config).await.unwrap();
        store.set_eviction_interval(15).await.unwrap();
        store.close().await;

        let store = open_store(&config).await.unwrap();
        assert_eq!(store.eviction_interval().await.unwrap(), 15);
    }
}
