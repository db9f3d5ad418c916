//! Repository for the `downloads` table.

use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{DownloadRecord, NewDownloadRecord};

const COLUMNS: &str = "filename, remote_url, size_bytes, created_at";

/// Result of attempting to register a filename.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(DownloadRecord),
    /// Another writer already holds the filename.
    AlreadyExists,
}

pub struct DownloadRepo;

impl DownloadRepo {
    /// Insert a record, relying on the UNIQUE constraint to settle races
    /// between concurrent registrations of the same filename.
    pub async fn insert(
        pool: &SqlitePool,
        input: &NewDownloadRecord,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let query = format!(
            "INSERT INTO downloads (filename, remote_url, size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {COLUMNS}"
        );
        let result = sqlx::query_as::<_, DownloadRecord>(&query)
            .bind(&input.filename)
            .bind(&input.remote_url)
            .bind(input.size_bytes)
            .bind(Utc::now())
            .fetch_one(pool)
            .await;

        match result {
            Ok(record) => Ok(InsertOutcome::Inserted(record)),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn find_by_filename(
        pool: &SqlitePool,
        filename: &str,
    ) -> Result<Option<DownloadRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM downloads WHERE filename = ?1");
        sqlx::query_as::<_, DownloadRecord>(&query)
            .bind(filename)
            .fetch_optional(pool)
            .await
    }

    /// List all records, newest first.
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DownloadRecord>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM downloads ORDER BY created_at DESC, filename ASC");
        sqlx::query_as::<_, DownloadRecord>(&query)
            .fetch_all(pool)
            .await
    }

    /// Delete a record. Returns `true` if a row was removed.
    pub async fn delete(pool: &SqlitePool, filename: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM downloads WHERE filename = ?1")
            .bind(filename)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
