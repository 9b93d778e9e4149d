//! In-memory conversation store with idle expiry.
//!
//! Entries are shared as `Arc<tokio::sync::Mutex<T>>`: a caller holds the
//! entry lock for a whole turn, so turns on one conversation run one at a
//! time while other conversations proceed in parallel.

use super::metrics;
use crate::models::Expiring;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to one stored record.
pub type Entry<T> = Arc<Mutex<T>>;

pub struct SessionStore<T: Expiring> {
    name: &'static str,
    entries: DashMap<String, Entry<T>>,
    timeout: Duration,
}

impl<T: Expiring> SessionStore<T> {
    /// `name` labels the store in logs and the `chat_active_sessions` gauge.
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Mint a fresh identifier and store an empty record under it.
    pub fn create(&self) -> (String, Entry<T>) {
        let id = Uuid::new_v4().to_string();
        let entry = Arc::new(Mutex::new(T::fresh(id.clone())));
        self.entries.insert(id.clone(), entry.clone());
        self.publish();
        tracing::debug!(store = self.name, session_id = %id, "Session created");
        (id, entry)
    }

    /// Look up a live record. Expired records are removed and reported absent.
    pub fn get(&self, id: &str) -> Option<Entry<T>> {
        // Clone out of the map so no shard guard is held during removal.
        let entry = self.entries.get(id).map(|e| e.value().clone())?;

        if self.is_expired(&entry) {
            if self
                .entries
                .remove_if(id, |_, current| Arc::ptr_eq(current, &entry))
                .is_some()
            {
                self.publish();
            }
            tracing::info!(store = self.name, session_id = %id, "Session expired");
            return None;
        }

        Some(entry)
    }

    /// Look up a live record, creating an empty one under `id` if needed.
    pub fn get_or_insert(&self, id: &str) -> Entry<T> {
        if let Some(entry) = self.get(id) {
            return entry;
        }

        let entry = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(T::fresh(id.to_string()))))
            .value()
            .clone();
        self.publish();
        entry
    }

    /// Drop a record. Returns whether one was present.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            self.publish();
        }
        removed
    }

    /// Remove every expired record and return how many were evicted.
    pub fn cleanup(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry));
        self.publish();
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn publish(&self) {
        metrics::set_active_sessions(self.name, self.entries.len());
    }

    /// A record whose lock is held is in use and therefore not idle.
    fn is_expired(&self, entry: &Entry<T>) -> bool {
        match entry.try_lock() {
            Ok(record) => {
                let idle = Utc::now().signed_duration_since(record.last_activity());
                idle.to_std().map(|idle| idle > self.timeout).unwrap_or(false)
            }
            Err(_) => false,
        }
    }
}

/// Run [`SessionStore::cleanup`] every `interval`.
pub fn spawn_cleanup_task<T: Expiring>(
    store: Arc<SessionStore<T>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.cleanup();
            if evicted > 0 {
                let remaining = store.len();
                tracing::info!(store = store.name(), evicted, remaining, "Expired sessions removed");
            }
        }
    })
}
