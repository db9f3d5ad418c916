use crate::store::DownloadRecord;
use serde::Serialize;
use url::Url;

/// A request to cache a remote resource.
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    pub url: String,
    /// Overrides the name advertised by the remote
    pub filename: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// A record was created and a worker started.
    Accepted(DownloadRecord),
    /// The derived name is already registered or being fetched; nothing was started.
    Duplicate { filename: String },
}

impl StartOutcome {
    pub fn filename(&self) -> &str {
        match self {
            StartOutcome::Accepted(record) => &record.filename,
            StartOutcome::Duplicate { filename } => filename,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, StartOutcome::Accepted(_))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StorageSummary {
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Work handed to a fetch worker.
#[derive(Clone, Debug)]
pub(crate) struct FetchJob {
    pub url: Url,
    pub filename: String,
    pub declared_size: u64,
}
