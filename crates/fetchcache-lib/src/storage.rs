//! Layout of the flat storage directory.
//!
//! Committed files carry their sanitized name, which never starts with a dot.
//! In-flight files are named `.{name}.{random}.tmp`; anything matching that
//! marker is invisible to listings and never evicted.

use crate::error::FetchCacheError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".tmp";
/// Keeps temp names under the usual 255-byte component limit.
const TEMP_STEM_MAX_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub size_bytes: u64,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
}

#[derive(Clone, Debug)]
pub struct StorageDir {
    root: PathBuf,
}

impl StorageDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_exists(&self) -> Result<(), FetchCacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| FetchCacheError::StorageDirectoryCreation {
                path: self.root.clone(),
                reason: e.to_string(),
            })
    }

    pub fn final_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Create a private temp file for `filename`, unique across concurrent
    /// and past fetches of the same target. The file is removed when the
    /// returned handle (or its `TempPath`) is dropped without being persisted.
    pub fn create_temp_file(&self, filename: &str) -> Result<NamedTempFile, FetchCacheError> {
        let stem: String = filename.chars().take(TEMP_STEM_MAX_CHARS).collect();
        tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}{stem}."))
            .suffix(TEMP_SUFFIX)
            .rand_bytes(16)
            .tempfile_in(&self.root)
            .map_err(Into::into)
    }

    /// Committed regular files, sorted by name.
    pub async fn list_committed(&self) -> Result<Vec<StoredFile>, FetchCacheError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_temp_file_name(&filename) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Deleted between read_dir and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                filename,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }
}

pub fn is_temp_file_name(filename: &str) -> bool {
    filename.starts_with(TEMP_PREFIX) && filename.ends_with(TEMP_SUFFIX)
}
