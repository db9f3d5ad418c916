//! Durable metadata: registered downloads and tunable settings.

mod downloads;
mod models;
mod settings;

pub use downloads::{DownloadRepo, InsertOutcome};
pub use models::{DownloadRecord, NewDownloadRecord, Setting};
pub use settings::{CLEANUP_INTERVAL_KEY, DEFAULT_CLEANUP_INTERVAL_MINUTES, SettingRepo};

use crate::config::StorageConfig;
use crate::error::FetchCacheError;
use eyre::eyre;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::time::Duration;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS downloads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL UNIQUE,
        remote_url TEXT NOT NULL,
        size_bytes INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    )",
];

/// Handle to the SQLite database shared by every process serving the same
/// storage directory. Cheap to clone.
#[derive(Clone, Debug)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self, FetchCacheError> {
        let path = &config.database_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FetchCacheError::StorageDirectoryCreation {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Several processes may write concurrently.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(opts)
            .await?;

        tracing::debug!(path = %path.display(), "Connected to metadata store");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if missing. Idempotent.
    pub async fn create_schema(&self) -> Result<(), FetchCacheError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert first-run setting rows without overwriting operator changes.
    /// A zero interval seeds the built-in default instead.
    pub async fn seed_defaults(&self, interval_minutes: u32) -> Result<(), FetchCacheError> {
        let interval_minutes = if interval_minutes == 0 {
            DEFAULT_CLEANUP_INTERVAL_MINUTES
        } else {
            interval_minutes
        };
        let inserted = SettingRepo::insert_default(
            &self.pool,
            CLEANUP_INTERVAL_KEY,
            &interval_minutes.to_string(),
        )
        .await?;
        if inserted {
            tracing::info!(
                key = CLEANUP_INTERVAL_KEY,
                value = interval_minutes,
                "Seeded default setting"
            );
        }
        Ok(())
    }

    /// Read the stored eviction interval. Fails if the row is missing or
    /// does not hold a positive number of minutes.
    pub async fn eviction_interval(&self) -> Result<u32, FetchCacheError> {
        let setting = SettingRepo::get(&self.pool, CLEANUP_INTERVAL_KEY)
            .await?
            .ok_or_else(|| eyre!("setting {CLEANUP_INTERVAL_KEY} is not present"))?;

        setting
            .value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or_else(|| {
                eyre!(
                    "setting {CLEANUP_INTERVAL_KEY} holds {:?}, expected a positive number of minutes",
                    setting.value
                )
                .into()
            })
    }

    pub async fn set_eviction_interval(&self, minutes: u32) -> Result<(), FetchCacheError> {
        if minutes == 0 {
            return Err(FetchCacheError::invalid_request(
                "eviction interval must be at least one minute",
            ));
        }
        SettingRepo::upsert(&self.pool, CLEANUP_INTERVAL_KEY, &minutes.to_string()).await?;
        tracing::info!(minutes, "Updated eviction interval");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{open_initialized_store, storage_config};
    use super::*;

    #[tokio::test]
    async fn test_eviction_interval_persists_across_reopen() {
        let (dir, store) = open_initialized_store().await;

        store.set_eviction_interval(45).await.unwrap();
        store.close().await;

        let reopened = MetadataStore::connect(&storage_config(&dir)).await.unwrap();
        assert_eq!(reopened.eviction_interval().await.unwrap(), 45);
    }

    #[tokio::test]
    async fn test_eviction_interval_rejects_zero() {
        let (_dir, store) = open_initialized_store().await;

        assert!(matches!(
            store.set_eviction_interval(0).await,
            Err(FetchCacheError::InvalidRequest { .. })
        ));
        assert_eq!(store.eviction_interval().await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_eviction_interval_non_numeric_is_an_error() {
        let (_dir, store) = open_initialized_store().await;

        SettingRepo::upsert(store.pool(), CLEANUP_INTERVAL_KEY, "soon")
            .await
            .unwrap();

        assert!(store.eviction_interval().await.is_err());
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let (_dir, store) = open_initialized_store().await;

        store.create_schema().await.unwrap();
        store.seed_defaults(5).await.unwrap();

        assert_eq!(store.eviction_interval().await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_seed_defaults_uses_given_interval() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::connect(&storage_config(&dir)).await.unwrap();
        store.create_schema().await.unwrap();

        store.seed_defaults(5).await.unwrap();

        assert_eq!(store.eviction_interval().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_seed_defaults_replaces_zero_with_builtin_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::connect(&storage_config(&dir)).await.unwrap();
        store.create_schema().await.unwrap();

        store.seed_defaults(0).await.unwrap();

        assert_eq!(
            store.eviction_interval().await.unwrap(),
            DEFAULT_CLEANUP_INTERVAL_MINUTES
        );
    }
}
