//! Time-based eviction of committed files.
//!
//! A sweep is stateless and meant to be triggered from outside the serving
//! process (cron, a systemd timer, `fetchcache sweep`). It only consults the
//! filesystem and the interval setting; download records are left alone, so
//! an evicted file leaves its record behind.

use crate::config::Config;
use crate::error::FetchCacheError;
use crate::storage::StorageDir;
use crate::store::MetadataStore;
use serde::Serialize;
use std::time::{Duration, SystemTime};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub interval_minutes: u32,
    /// Committed files considered; temp files are never counted
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

pub struct Sweeper {
    store: MetadataStore,
    storage: StorageDir,
    default_interval_minutes: u32,
}

impl Sweeper {
    pub fn new(config: &Config, store: MetadataStore) -> Self {
        Self {
            store,
            storage: StorageDir::new(&config.storage.downloads_dir),
            default_interval_minutes: config.eviction.default_interval_minutes,
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, FetchCacheError> {
        self.sweep_at(SystemTime::now()).await
    }

    /// Delete every committed file last modified more than the configured
    /// interval before `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> Result<SweepReport, FetchCacheError> {
        let interval_minutes = self.interval_minutes().await;
        let max_age = Duration::from_secs(u64::from(interval_minutes) * 60);

        let files = self.storage.list_committed().await?;
        let mut report = SweepReport {
            interval_minutes,
            scanned: files.len(),
            ..SweepReport::default()
        };

        for file in files {
            let Some(modified) = file.modified else {
                continue;
            };
            // Timestamps in the future count as fresh.
            let Ok(age) = now.duration_since(modified) else {
                continue;
            };
            if age <= max_age {
                continue;
            }

            let path = self.storage.final_path(&file.filename);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    report.deleted += 1;
                    tracing::info!(
                        filename = %file.filename,
                        age_secs = age.as_secs(),
                        "Evicted stored file"
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(filename = %file.filename, "Failed to evict stored file: {e}");
                }
            }
        }

        tracing::info!(
            interval_minutes,
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            "Eviction sweep finished"
        );
        Ok(report)
    }

    async fn interval_minutes(&self) -> u32 {
        match self.store.eviction_interval().await {
            Ok(minutes) => minutes,
            Err(e) => {
                tracing::warn!(
                    default = self.default_interval_minutes,
                    "Could not read eviction interval, using default: {e}"
                );
                self.default_interval_minutes
            }
        }
    }
}
