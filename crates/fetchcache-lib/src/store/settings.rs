//! Repository for the `settings` table.

use sqlx::SqlitePool;

use super::models::Setting;

/// Key of the eviction interval, in minutes.
pub const CLEANUP_INTERVAL_KEY: &str = "cleanup_interval";
pub const DEFAULT_CLEANUP_INTERVAL_MINUTES: u32 = 60;

pub struct SettingRepo;

impl SettingRepo {
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<Setting>, sqlx::Error> {
        sqlx::query_as::<_, Setting>("SELECT key, value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    pub async fn upsert(pool: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert the value only if the key is not present yet.
    pub async fn insert_default(
        pool: &SqlitePool,
        key: &str,
        value: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_initialized_store;

    #[tokio::test]
    async fn test_default_interval_is_seeded() {
        let (_dir, store) = open_initialized_store().await;

        let setting = SettingRepo::get(store.pool(), CLEANUP_INTERVAL_KEY)
            .await
            .unwrap()
            .expect("default should be seeded");
        assert_eq!(setting.value, "60");
    }

    #[tokio::test]
    async fn test_insert_default_keeps_existing_value() {
        let (_dir, store) = open_initialized_store().await;

        SettingRepo::upsert(store.pool(), CLEANUP_INTERVAL_KEY, "45")
            .await
            .unwrap();
        let inserted = SettingRepo::insert_default(store.pool(), CLEANUP_INTERVAL_KEY, "60")
            .await
            .unwrap();

        assert!(!inserted);
        let setting = SettingRepo::get(store.pool(), CLEANUP_INTERVAL_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(setting.value, "45");
    }
}
