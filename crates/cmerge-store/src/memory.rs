use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::{KvStore, ScanBatch, SCAN_START};

/// In-memory, sorted-map key-value store.
///
/// Intended for tests and embedding. Scans behave like Redis: each step
/// examines up to `count` keys of the whole key space in order and returns
/// only those matching the pattern, so a step can come back empty while the
/// cursor is still non-zero. The cursor is the number of keys examined so far.
pub struct InMemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
    scan_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

impl InMemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            scan_calls: AtomicUsize::new(0),
            set_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-populated with `pairs`.
    pub fn with_entries<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (k, v) in pairs {
            store.insert(k, v);
        }
        store
    }

    /// Insert a pair directly, bypassing the call counters.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.into(), value.into());
    }

    /// Read a value directly, bypassing the trait.
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.read().expect("lock poisoned").get(key).cloned()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Copy of every stored pair, in key order.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().expect("lock poisoned").clone()
    }

    /// Number of scan steps served so far.
    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::Relaxed)
    }

    /// Number of writes served so far.
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanBatch> {
        self.scan_calls.fetch_add(1, Ordering::Relaxed);
        let matcher = glob::Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let map = self.entries.read().expect("lock poisoned");
        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let step = count.max(1);

        let keys: Vec<String> = map
            .keys()
            .skip(start)
            .take(step)
            .filter(|k| matcher.matches(k))
            .cloned()
            .collect();

        let examined = start.saturating_add(step);
        let next = if examined >= map.len() {
            SCAN_START
        } else {
            examined as u64
        };
        Ok(ScanBatch { cursor: next, keys })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
        self.insert(key, value);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .finish()
    }
}
