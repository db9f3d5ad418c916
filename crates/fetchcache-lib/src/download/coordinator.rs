use super::filename::sanitize_filename;
use super::probe::{ensure_public_host, parse_remote_url, probe};
use super::types::{DownloadRequest, FetchJob, StartOutcome, StorageSummary};
use super::worker::Fetcher;
use crate::config::{Config, FetchConfig};
use crate::error::FetchCacheError;
use crate::progress::{ActiveFetch, ProgressTracker};
use crate::storage::{StorageDir, StoredFile};
use crate::store::{DownloadRecord, DownloadRepo, InsertOutcome, MetadataStore, NewDownloadRecord};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Public entry point of the cache engine.
///
/// The caller is trusted: authentication happens in front of this type.
/// Cheap to clone; clones share the tracker and the worker pool.
#[derive(Clone)]
pub struct Coordinator {
    client: Client,
    store: MetadataStore,
    storage: StorageDir,
    tracker: ProgressTracker,
    fetcher: Fetcher,
    options: Arc<FetchConfig>,
    default_interval_minutes: u32,
}

impl Coordinator {
    pub fn new(config: &Config, store: MetadataStore) -> Result<Self, FetchCacheError> {
        let client = Client::builder()
            .user_agent(config.fetch.user_agent.clone())
            .connect_timeout(config.fetch.connect_timeout())
            .build()?;
        let storage = StorageDir::new(&config.storage.downloads_dir);
        let fetcher = Fetcher::new(
            client.clone(),
            store.clone(),
            storage.clone(),
            config.fetch.transfer_idle_timeout(),
            config.fetch.max_concurrent_fetches,
        );

        Ok(Self {
            client,
            store,
            storage,
            tracker: ProgressTracker::new(),
            fetcher,
            options: Arc::new(config.fetch.clone()),
            default_interval_minutes: config.eviction.default_interval_minutes,
        })
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn storage(&self) -> &StorageDir {
        &self.storage
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Validate, probe and register a download, then start its worker in the
    /// background. Returns without waiting for the transfer.
    pub async fn start_download(
        &self,
        request: DownloadRequest,
    ) -> Result<StartOutcome, FetchCacheError> {
        let url = parse_remote_url(&request.url)?;
        if !self.options.allow_private_addresses {
            ensure_public_host(&url).await?;
        }

        let probed = probe(&self.client, &url, self.options.probe_timeout()).await?;

        let candidate = request
            .filename
            .filter(|name| !name.trim().is_empty())
            .or(probed.candidate_filename)
            .ok_or_else(|| {
                FetchCacheError::invalid_request(format!("Could not determine a filename for {url}"))
            })?;
        let filename = sanitize_filename(&candidate).ok_or_else(|| {
            FetchCacheError::invalid_request(format!("Filename {candidate:?} is not usable"))
        })?;

        if self.tracker.contains(&filename)
            || DownloadRepo::find_by_filename(self.store.pool(), &filename)
                .await?
                .is_some()
        {
            tracing::info!(%filename, url = %url, "Already present, not starting another fetch");
            return Ok(StartOutcome::Duplicate { filename });
        }

        let new_record = NewDownloadRecord {
            filename: filename.clone(),
            remote_url: url.to_string(),
            size_bytes: i64::try_from(probed.declared_size).unwrap_or(i64::MAX),
        };
        let record = match DownloadRepo::insert(self.store.pool(), &new_record).await? {
            InsertOutcome::Inserted(record) => record,
            InsertOutcome::AlreadyExists => {
                tracing::info!(%filename, url = %url, "Lost registration race, treating as duplicate");
                return Ok(StartOutcome::Duplicate { filename });
            }
        };

        let Some(progress) = self.tracker.register(&filename, probed.declared_size) else {
            tracing::info!(%filename, "A fetch for this name is still running");
            return Ok(StartOutcome::Duplicate { filename });
        };

        tracing::info!(
            %filename,
            url = %url,
            declared_size = probed.declared_size,
            "Queued download"
        );
        self.fetcher.spawn(
            FetchJob {
                url,
                filename,
                declared_size: probed.declared_size,
            },
            progress,
        );

        Ok(StartOutcome::Accepted(record))
    }

    /// Committed files currently on disk.
    pub async fn list_stored_files(&self) -> Result<Vec<StoredFile>, FetchCacheError> {
        self.storage.list_committed().await
    }

    /// Every registered download, newest first. A record may outlive its file.
    pub async fn list_records(&self) -> Result<Vec<DownloadRecord>, FetchCacheError> {
        Ok(DownloadRepo::list_all(self.store.pool()).await?)
    }

    pub async fn storage_summary(&self) -> Result<StorageSummary, FetchCacheError> {
        let files = self.list_stored_files().await?;
        Ok(StorageSummary {
            file_count: files.len(),
            total_bytes: files.iter().map(|f| f.size_bytes).sum(),
        })
    }

    /// Fetches running in this process.
    pub fn active_fetches(&self) -> BTreeMap<String, ActiveFetch> {
        self.tracker.snapshot()
    }

    /// Remove a download's record and its backing file.
    pub async fn delete(&self, filename: &str) -> Result<(), FetchCacheError> {
        let not_found = || FetchCacheError::NotFound {
            filename: filename.to_string(),
        };
        let filename = sanitize_filename(filename).ok_or_else(not_found)?;

        if !DownloadRepo::delete(self.store.pool(), &filename).await? {
            tracing::warn!(%filename, "Delete requested for unknown download");
            return Err(not_found());
        }

        let path = self.storage.final_path(&filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!(%filename, path = %path.display(), "Deleted stored file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(%filename, "No backing file to delete");
            }
            Err(e) => {
                tracing::error!(%filename, path = %path.display(), "Failed to delete stored file: {e}");
            }
        }

        tracing::info!(%filename, "Deleted download record");
        Ok(())
    }

    /// The configured eviction interval in minutes, falling back to the
    /// default when the stored value is missing or unusable.
    pub async fn eviction_interval(&self) -> Result<u32, FetchCacheError> {
        match self.store.eviction_interval().await {
            Ok(minutes) => Ok(minutes),
            Err(FetchCacheError::Database(e)) => Err(FetchCacheError::Database(e)),
            Err(e) => {
                tracing::warn!("Using default eviction interval: {e}");
                Ok(self.default_interval_minutes)
            }
        }
    }

    pub async fn set_eviction_interval(&self, minutes: u32) -> Result<(), FetchCacheError> {
        self.store.set_eviction_interval(minutes).await
    }
}
