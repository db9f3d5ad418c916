use super::types::FetchJob;
use crate::error::FetchCacheError;
use crate::progress::ProgressGuard;
use crate::storage::StorageDir;
use crate::store::{DownloadRepo, MetadataStore};
use eyre::{Result, WrapErr, bail, eyre};
use futures::StreamExt;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;

/// Write buffer size for the temp file.
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// How a finished worker left the storage directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Completion {
    Committed(u64),
    /// The record was deleted mid-transfer; nothing was kept
    Discarded,
}

/// Runs detached fetch workers. Admission is bounded by a semaphore; workers
/// beyond the limit wait for a permit while already visible in the tracker.
///
/// Workers cannot be cancelled: once spawned they run until the transfer
/// commits or fails.
#[derive(Clone)]
pub(crate) struct Fetcher {
    client: Client,
    store: MetadataStore,
    storage: StorageDir,
    idle_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    pub(crate) fn new(
        client: Client,
        store: MetadataStore,
        storage: StorageDir,
        idle_timeout: Duration,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            client,
            store,
            storage,
            idle_timeout,
            permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        }
    }

    /// Spawn a worker for `job`. The tracker entry held by `progress` is
    /// released when the worker ends, whatever the outcome.
    pub(crate) fn spawn(&self, job: FetchJob, progress: ProgressGuard) {
        let fetcher = self.clone();
        tokio::spawn(async move {
            let _permit = match fetcher.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!(filename = %job.filename, "Fetch pool closed before the worker started");
                    return;
                }
            };

            match fetcher.fetch_and_commit(&job, &progress).await {
                Ok(Completion::Committed(bytes)) => {
                    tracing::info!(filename = %job.filename, url = %job.url, bytes, "Download committed");
                }
                Ok(Completion::Discarded) => {
                    tracing::info!(filename = %job.filename, url = %job.url, "Download deleted while in flight, discarded");
                }
                Err(err) => {
                    // The record stays registered without a backing file.
                    tracing::error!(filename = %job.filename, url = %job.url, "{err}");
                }
            }
            drop(progress);
        });
    }

    /// Stream the remote body into a temp file and rename it into place.
    /// On failure the temp file is removed and the final name is untouched.
    /// If the record disappears during the transfer the body is discarded.
    pub(crate) async fn fetch_and_commit(
        &self,
        job: &FetchJob,
        progress: &ProgressGuard,
    ) -> Result<Completion, FetchCacheError> {
        self.try_fetch_and_commit(job, progress)
            .await
            .map_err(|report| FetchCacheError::TransferFailed {
                filename: job.filename.clone(),
                url: job.url.to_string(),
                reason: format!("{report:#}"),
            })
    }

    async fn try_fetch_and_commit(
        &self,
        job: &FetchJob,
        progress: &ProgressGuard,
    ) -> Result<Completion> {
        self.storage.ensure_exists().await?;

        let temp = self
            .storage
            .create_temp_file(&job.filename)
            .wrap_err("Failed to create temp file")?;
        let (file, temp_path) = temp.into_parts();
        tracing::debug!(filename = %job.filename, temp = %temp_path.display(), "Downloading");

        let written = self
            .transfer(job, tokio::fs::File::from_std(file), progress)
            .await
            .wrap_err_with(|| format!("Failed to download into {}", temp_path.display()))?;

        if !self.record_exists(&job.filename).await? {
            // Dropping the TempPath removes the temp file.
            drop(temp_path);
            return Ok(Completion::Discarded);
        }

        let final_path = self.storage.final_path(&job.filename);
        commit(temp_path, final_path.clone())
            .await
            .wrap_err_with(|| format!("Failed to commit {}", final_path.display()))?;

        // A delete may land between the check and the rename.
        if !self.record_exists(&job.filename).await? {
            tokio::fs::remove_file(&final_path)
                .await
                .wrap_err_with(|| format!("Failed to discard {}", final_path.display()))?;
            return Ok(Completion::Discarded);
        }

        Ok(Completion::Committed(written))
    }

    async fn record_exists(&self, filename: &str) -> Result<bool> {
        let record = DownloadRepo::find_by_filename(self.store.pool(), filename)
            .await
            .wrap_err("Failed to look up download record")?;
        Ok(record.is_some())
    }

    async fn transfer(
        &self,
        job: &FetchJob,
        file: tokio::fs::File,
        progress: &ProgressGuard,
    ) -> Result<u64> {
        let response = tokio::time::timeout(self.idle_timeout, self.client.get(job.url.clone()).send())
            .await
            .map_err(|_| eyre!("No response within {:?}", self.idle_timeout))?
            .wrap_err("Request failed")?
            .error_for_status()
            .wrap_err("Remote returned an error status")?;

        let expected_len = response.content_length();
        if job.declared_size > 0 && expected_len.is_some_and(|len| len != job.declared_size) {
            tracing::warn!(
                filename = %job.filename,
                declared = job.declared_size,
                reported = ?expected_len,
                "Remote size changed since probe"
            );
        }

        let mut stream = response.bytes_stream();
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut written: u64 = 0;

        loop {
            let next = tokio::time::timeout(self.idle_timeout, stream.next())
                .await
                .map_err(|_| eyre!("No data received for {:?}", self.idle_timeout))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.wrap_err("Failed to read response body")?;

            writer
                .write_all(&chunk)
                .await
                .wrap_err("Failed to write temp file")?;

            written += chunk.len() as u64;
            progress.add_transferred(chunk.len() as u64);
        }

        writer.flush().await.wrap_err("Failed to flush temp file")?;
        writer
            .into_inner()
            .sync_all()
            .await
            .wrap_err("Failed to sync temp file")?;

        if job.declared_size > 0 {
            if written != job.declared_size {
                bail!(
                    "Received {written} bytes, expected {} from the initial request",
                    job.declared_size
                );
            }
        } else if let Some(expected) = expected_len.filter(|expected| *expected != written) {
            bail!("Received {written} bytes, remote announced {expected}");
        }

        Ok(written)
    }
}

/// Atomically move the finished temp file onto its final name. This is a
/// plain rename within the storage directory; it fails rather than copying.
async fn commit(temp_path: TempPath, final_path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || temp_path.persist(&final_path))
        .await
        .wrap_err("Commit task panicked")?
        // Dropping the returned TempPath removes the temp file.
        .map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressTracker;
    use crate::storage::is_temp_file_name;
    use crate::store::NewDownloadRecord;
    use crate::store::test_support::open_initialized_store;
    use url::Url;

    fn job(url: &str, filename: &str) -> FetchJob {
        FetchJob {
            url: Url::parse(url).unwrap(),
            filename: filename.to_string(),
            declared_size: 0,
        }
    }

    fn entries(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_failed_connection_leaves_no_files() {
        let (dir, store) = open_initialized_store().await;
        let storage = StorageDir::new(dir.path().join("downloads"));
        let fetcher = Fetcher::new(Client::new(), store, storage, Duration::from_secs(5), 1);
        let tracker = ProgressTracker::new();
        let guard = tracker.register("a.bin", 0).unwrap();

        // Port 9 on loopback (discard) is not expected to accept HTTP.
        let result = fetcher
            .fetch_and_commit(&job("http://127.0.0.1:9/a.bin", "a.bin"), &guard)
            .await;

        assert!(matches!(
            result,
            Err(FetchCacheError::TransferFailed { ref filename, .. }) if filename == "a.bin"
        ));
        assert!(entries(&dir.path().join("downloads")).is_empty());
    }

    #[tokio::test]
    async fn test_commit_replaces_temp_with_final_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageDir::new(dir.path());

        let temp = storage.create_temp_file("a.bin").unwrap();
        std::fs::write(temp.path(), b"payload").unwrap();
        let (_file, temp_path) = temp.into_parts();

        commit(temp_path, storage.final_path("a.bin")).await.unwrap();

        let names = entries(dir.path());
        assert_eq!(names, vec!["a.bin".to_string()]);
        assert!(!names.iter().any(|name| is_temp_file_name(name)));
        assert_eq!(std::fs::read(dir.path().join("a.bin")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_unregistered_download_is_discarded() {
        let (dir, store) = open_initialized_store().await;
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;
        let downloads = dir.path().join("downloads");
        let fetcher = Fetcher::new(
            Client::new(),
            store.clone(),
            StorageDir::new(&downloads),
            Duration::from_secs(5),
            1,
        );
        let tracker = ProgressTracker::new();
        let url = format!("{}/kept.bin", server.uri());

        let guard = tracker.register("gone.bin", 0).unwrap();
        let outcome = fetcher
            .fetch_and_commit(&job(&url, "gone.bin"), &guard)
            .await
            .unwrap();
        assert_eq!(outcome, Completion::Discarded);
        assert!(entries(&downloads).is_empty());

        DownloadRepo::insert(
            store.pool(),
            &NewDownloadRecord {
                filename: "kept.bin".to_string(),
                remote_url: url.clone(),
                size_bytes: 64,
            },
        )
        .await
        .unwrap();
        let guard = tracker.register("kept.bin", 0).unwrap();
        let outcome = fetcher
            .fetch_and_commit(&job(&url, "kept.bin"), &guard)
            .await
            .unwrap();
        assert_eq!(outcome, Completion::Committed(64));
        assert_eq!(entries(&downloads), vec!["kept.bin".to_string()]);
    }
}
