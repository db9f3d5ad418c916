pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod eviction;
pub mod init;
pub mod progress;
pub mod storage;
pub mod store;
pub mod utils;

pub use config::Config;
pub use download::{Coordinator, DownloadRequest, StartOutcome, StorageSummary};
pub use error::FetchCacheError;
pub use eviction::{SweepReport, Sweeper};
pub use init::{InitOutcome, initialize, open_store};
pub use progress::{ActiveFetch, ProgressTracker};
pub use storage::StoredFile;
pub use store::{DownloadRecord, MetadataStore};
