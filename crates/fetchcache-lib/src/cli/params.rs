use crate::config::Config;
use crate::download::DownloadRequest;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Table }
    }
}

#[derive(Debug, Clone)]
pub struct FetchParams {
    pub config: Config,
    pub request: DownloadRequest,
}

#[derive(Debug, Clone)]
pub struct ListParams {
    pub config: Config,
    pub format: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct DeleteParams {
    pub config: Config,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct IntervalParams {
    pub config: Config,
    /// Set the interval when present, otherwise print it
    pub minutes: Option<u32>,
}
