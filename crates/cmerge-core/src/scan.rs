//! Cursor-driven key scanning.
//!
//! [`KeyScanner`] walks the whole key space of a [`KvStore`] one scan step at
//! a time. It keeps going through empty batches and stops only when the store
//! hands back [`SCAN_START`]. The current cursor is exposed so an interrupted
//! scan can be resumed with [`KeyScanner::resume`].

use std::collections::HashSet;

use cmerge_store::{KvStore, SCAN_START};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{MergeError, MergeResult};

/// A scanned key with its value decoded as an integer counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CounterEntry {
    pub key: String,
    pub value: i64,
}

/// Lazy scan over all keys matching a glob pattern.
pub struct KeyScanner<'a, S: KvStore + ?Sized> {
    store: &'a S,
    pattern: String,
    count: usize,
    cursor: u64,
    finished: bool,
    seen: HashSet<String>,
}

impl<'a, S: KvStore + ?Sized> KeyScanner<'a, S> {
    /// Start a fresh scan.
    pub fn new(store: &'a S, pattern: impl Into<String>, count: usize) -> Self {
        Self::resume(store, pattern, count, SCAN_START)
    }

    /// Continue a scan from a cursor saved earlier with [`KeyScanner::cursor`].
    pub fn resume(store: &'a S, pattern: impl Into<String>, count: usize, cursor: u64) -> Self {
        Self {
            store,
            pattern: pattern.into(),
            count,
            cursor,
            finished: false,
            seen: HashSet::new(),
        }
    }

    /// Cursor the next step will start from.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one scan step.
    ///
    /// Returns `Ok(None)` once the scan is complete. A returned batch may be
    /// empty. Keys already yielded by this scanner are dropped.
    pub async fn next_batch(&mut self) -> MergeResult<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }

        let batch = self
            .store
            .scan(self.cursor, &self.pattern, self.count)
            .await?;
        trace!(
            cursor = self.cursor,
            next = batch.cursor,
            keys = batch.keys.len(),
            "scan batch"
        );

        self.finished = batch.is_last();
        self.cursor = batch.cursor;

        let fresh = batch
            .keys
            .into_iter()
            .filter(|k| self.seen.insert(k.clone()))
            .collect();
        Ok(Some(fresh))
    }

    /// Drain the scan, returning every distinct key in the order first seen.
    pub async fn collect_keys(mut self) -> MergeResult<Vec<String>> {
        let mut keys = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            keys.extend(batch);
        }
        Ok(keys)
    }
}

/// Decode a stored counter value. Absent values count as zero.
pub fn parse_counter(key: &str, raw: Option<&str>) -> MergeResult<i64> {
    match raw {
        None => Ok(0),
        Some(text) => text.trim().parse::<i64>().map_err(|_| MergeError::Decode {
            key: key.to_string(),
            value: text.to_string(),
        }),
    }
}

/// Scan every key matching `pattern` and read its counter value.
///
/// The key list is fully collected before any value is read.
pub async fn scan_counters<S: KvStore + ?Sized>(
    store: &S,
    pattern: &str,
    count: usize,
) -> MergeResult<Vec<CounterEntry>> {
    let keys = KeyScanner::new(store, pattern, count).collect_keys().await?;
    debug!(pattern, matched = keys.len(), "scan complete");

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let raw = store.get(&key).await?;
        let value = parse_counter(&key, raw.as_deref())?;
        entries.push(CounterEntry { key, value });
    }
    Ok(entries)
}
