mod coordinator;
mod filename;
mod probe;
mod types;
mod worker;

pub use coordinator::Coordinator;
pub use filename::{filename_from_headers, filename_from_url, sanitize_filename};
pub use probe::{ProbeResult, ensure_public_host, parse_remote_url, probe};
pub use types::{DownloadRequest, StartOutcome, StorageSummary};
