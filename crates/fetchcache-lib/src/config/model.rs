use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub eviction: EvictionConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Flat directory holding committed files and in-flight temp files
    pub downloads_dir: PathBuf,
    /// SQLite database shared by every process serving the same directory
    pub database_path: PathBuf,
    /// Lock file used to elect the process that initializes the database
    pub init_lock_path: PathBuf,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("/data/downloads"),
            database_path: PathBuf::from("/data/proxy.db"),
            init_lock_path: PathBuf::from("/data/db_init.lock"),
            max_connections: 4,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct FetchConfig {
    pub probe_timeout_secs: u64,
    /// Maximum time to wait for the next body chunk during a transfer
    pub transfer_idle_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub user_agent: String,
    /// Permit URLs resolving to loopback, private or otherwise non-global addresses
    pub allow_private_addresses: bool,
}

impl FetchConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn transfer_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_idle_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            transfer_idle_timeout_secs: 300,
            connect_timeout_secs: 10,
            max_concurrent_fetches: 16,
            user_agent: concat!("fetchcache/", env!("CARGO_PKG_VERSION")).to_string(),
            allow_private_addresses: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct EvictionConfig {
    /// Seeded into the settings table on first initialization, and used
    /// when the stored interval cannot be read
    pub default_interval_minutes: u32,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: 60,
        }
    }
}
