use eyre::Result;
use fetchcache_lib::config::{Config, FetchConfig, StorageConfig};
use fetchcache_lib::{Coordinator, MetadataStore, open_store};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A cache rooted in a temp directory. Dropping it removes everything.
pub struct TestCache {
    pub dir: TempDir,
    pub config: Config,
    pub store: MetadataStore,
    pub coordinator: Coordinator,
}

impl TestCache {
    pub fn downloads_dir(&self) -> &Path {
        &self.config.storage.downloads_dir
    }

    /// Entry names in the storage directory, temp files included.
    pub fn directory_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.downloads_dir())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

pub fn create_test_config(root: &Path) -> Config {
    Config {
        storage: StorageConfig {
            downloads_dir: root.join("downloads"),
            database_path: root.join("proxy.db"),
            init_lock_path: root.join("db_init.lock"),
            max_connections: 4,
        },
        fetch: FetchConfig {
            probe_timeout_secs: 5,
            transfer_idle_timeout_secs: 10,
            connect_timeout_secs: 5,
            // The mock server listens on loopback.
            allow_private_addresses: true,
            ..FetchConfig::default()
        },
        ..Config::default()
    }
}

pub async fn setup_test_cache() -> Result<TestCache> {
    let dir = tempfile::tempdir()?;
    let config = create_test_config(dir.path());
    let store = open_store(&config).await?;
    let coordinator = Coordinator::new(&config, store.clone())?;

    Ok(TestCache {
        dir,
        config,
        store,
        coordinator,
    })
}

pub async fn wait_for_idle(coordinator: &Coordinator, timeout_secs: u64) -> bool {
    tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        coordinator.tracker().wait_until_idle(),
    )
    .await
    .is_ok()
}

/// Serve `body` at `route` as an attachment named `filename`.
pub async fn serve_attachment(server: &MockServer, route: &str, filename: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(attachment(filename, body))
        .mount(server)
        .await;
}

pub fn attachment(filename: &str, body: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\"").as_str(),
        )
        .set_body_bytes(body)
}

pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("fetchcache_lib=debug,fetchcache_e2e_tests=debug,sqlx=warn")
        .with_test_writer()
        .try_init()
        .ok();
}
