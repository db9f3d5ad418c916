use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `downloads` table.
#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct DownloadRecord {
    pub filename: String,
    pub remote_url: String,
    /// Size declared by the remote at probe time, 0 when unknown
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a new download.
#[derive(Debug, Clone)]
pub struct NewDownloadRecord {
    pub filename: String,
    pub remote_url: String,
    pub size_bytes: i64,
}

/// A row from the `settings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
