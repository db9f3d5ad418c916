//! Process-local tracking of in-flight fetches.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActiveFetch {
    /// Size declared by the remote, 0 when unknown
    pub declared_size: u64,
    pub bytes_transferred: u64,
}

impl ActiveFetch {
    /// Completion percentage, or `None` when the declared size is unknown.
    pub fn percent(&self) -> Option<f64> {
        if self.declared_size == 0 {
            return None;
        }
        Some((self.bytes_transferred as f64 / self.declared_size as f64 * 100.0).min(100.0))
    }
}

#[derive(Default)]
struct Shared {
    fetches: Mutex<HashMap<String, ActiveFetch>>,
    finished: Notify,
}

/// Shared map from filename to the progress of its running fetch.
///
/// A single mutex guards the whole map. Writers take it once per streamed
/// chunk.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    shared: Arc<Shared>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetch. Returns `None` if the filename is already being
    /// fetched by this process. The entry is removed when the returned guard
    /// is dropped.
    pub fn register(&self, filename: &str, declared_size: u64) -> Option<ProgressGuard> {
        let mut fetches = self.shared.fetches.lock();
        if fetches.contains_key(filename) {
            return None;
        }
        fetches.insert(
            filename.to_string(),
            ActiveFetch {
                declared_size,
                bytes_transferred: 0,
            },
        );
        Some(ProgressGuard {
            tracker: self.clone(),
            filename: filename.to_string(),
        })
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.shared.fetches.lock().contains_key(filename)
    }

    pub fn get(&self, filename: &str) -> Option<ActiveFetch> {
        self.shared.fetches.lock().get(filename).copied()
    }

    /// Point-in-time copy of every running fetch.
    pub fn snapshot(&self) -> BTreeMap<String, ActiveFetch> {
        self.shared
            .fetches
            .lock()
            .iter()
            .map(|(name, fetch)| (name.clone(), *fetch))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.fetches.lock().is_empty()
    }

    /// Resolves once no fetch is registered under `filename`.
    pub async fn wait_until_finished(&self, filename: &str) {
        loop {
            let notified = self.shared.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.contains(filename) {
                return;
            }
            notified.await;
        }
    }

    /// Resolves once no fetch at all is registered.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.shared.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn add_transferred(&self, filename: &str, bytes: u64) {
        if let Some(fetch) = self.shared.fetches.lock().get_mut(filename) {
            fetch.bytes_transferred += bytes;
        }
    }

    fn clear(&self, filename: &str) {
        self.shared.fetches.lock().remove(filename);
        self.shared.finished.notify_waiters();
    }
}

/// Ownership of one tracker entry. Only the holder updates the counter.
pub struct ProgressGuard {
    tracker: ProgressTracker,
    filename: String,
}

impl ProgressGuard {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn add_transferred(&self, bytes: u64) {
        self.tracker.add_transferred(&self.filename, bytes);
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.tracker.clear(&self.filename);
    }
}
